use std::time::Duration;

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use humansize::{format_size, DECIMAL};
use indicatif::{ProgressBar, ProgressStyle};
use promptsync_core::{Collections, MergeMode, SyncDirection, SyncDocument, SyncState, SyncStatus};
use promptsync_engine::{
    Notification, NotificationKind, SyncError, SyncHandle, SyncOrchestrator, SyncReport,
    WatchOutcome,
};

use crate::{CliContext, CliDirection, CliMergeMode};

fn spinner(msg: impl Into<String>) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(msg.into());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

fn format_millis(ms: Option<i64>) -> String {
    ms.and_then(chrono::DateTime::from_timestamp_millis)
        .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Wait for a background sync, cancelling it on Ctrl-C.
async fn drive(
    orch: &SyncOrchestrator,
    handle: SyncHandle,
    pb: &ProgressBar,
) -> Result<SyncReport, SyncError> {
    let direction = handle.direction();
    let wait = handle.wait();
    tokio::pin!(wait);
    tokio::select! {
        res = &mut wait => res,
        _ = tokio::signal::ctrl_c() => {
            pb.set_message("Cancelling...");
            orch.cancel(direction);
            wait.await
        }
    }
}

fn print_report(report: &SyncReport) {
    println!("\n:: {} complete ({})", report.direction, report.id);
    println!("   Prompts:    {}", report.prompts);
    println!("   Categories: {}", report.categories);
    if let Some(mode) = report.mode {
        println!("   Mode:       {}", mode);
    }
    if report.mode == Some(MergeMode::Append) {
        println!(
            "   Added:      {} prompts, {} categories",
            report.added_prompts, report.added_categories
        );
    }
    if let Some(bytes) = report.bytes {
        println!("   Uploaded:   {}", format_size(bytes, DECIMAL));
    }
    println!("   {}", report.message);
}

pub async fn cmd_test(ctx: &CliContext) -> Result<()> {
    let orch = ctx.orchestrator()?;
    let creds = orch.credentials()?;
    println!(":: Testing connection...");
    println!("   Server: {}", creds.base_url());
    println!("   User:   {}", creds.username);

    let pb = spinner("Contacting server...")?;
    let res = orch.test_connection(&creds).await;
    pb.finish_and_clear();
    res?;
    println!(":: Connection OK");
    Ok(())
}

pub async fn cmd_push(ctx: &CliContext) -> Result<SyncReport> {
    let orch = ctx.orchestrator()?;
    let creds = orch.credentials()?;
    println!(":: Pushing local data...");
    println!("   Target: {}{}", creds.base_url(), creds.document_path());

    let handle = orch.start_push()?;
    let pb = spinner(format!("Uploading ({})", handle.id()))?;
    let res = drive(&orch, handle, &pb).await;
    pb.finish_and_clear();

    let report = res.context("Push failed")?;
    print_report(&report);
    Ok(report)
}

pub async fn cmd_pull(ctx: &CliContext, mode: CliMergeMode) -> Result<SyncReport> {
    let orch = ctx.orchestrator()?;
    let creds = orch.credentials()?;
    let mode = MergeMode::from(mode);
    println!(":: Pulling remote data...");
    println!("   Source: {}{}", creds.base_url(), creds.document_path());
    println!("   Mode:   {}", mode);

    let handle = orch.start_pull(mode)?;
    let pb = spinner(format!("Downloading ({})", handle.id()))?;
    let res = drive(&orch, handle, &pb).await;
    pb.finish_and_clear();

    let report = res.context("Pull failed")?;
    print_report(&report);
    Ok(report)
}

fn print_status(direction: SyncDirection, status: Option<&SyncStatus>) {
    println!(":: {}", direction);
    let Some(status) = status else {
        println!("   No sync recorded");
        return;
    };
    let state = match status.status {
        SyncState::InProgress => "in progress",
        SyncState::Success => "success",
        SyncState::Error => "error",
    };
    println!("   Sync ID:   {}", status.id);
    println!("   State:     {}", state);
    println!("   Started:   {}", format_millis(status.start_time));
    println!("   Completed: {}", format_millis(status.completed_time));
    if let Some(message) = &status.message {
        println!("   Message:   {}", message);
    }
    if let Some(error) = &status.error {
        println!("   Error:     {}", error);
    }
}

/// Show the last recorded status per direction.
///
/// With `watch`, an `in_progress` record is polled until it settles. With
/// `clear`, the records are removed instead.
pub async fn cmd_status(
    ctx: &CliContext,
    direction: Option<CliDirection>,
    watch: bool,
    clear: bool,
) -> Result<Vec<(SyncDirection, Option<SyncStatus>)>> {
    let orch = ctx.orchestrator()?;
    let directions: Vec<SyncDirection> = match direction {
        Some(d) => vec![d.into()],
        None => SyncDirection::ALL.to_vec(),
    };

    if clear {
        for dir in &directions {
            orch.state().clear(*dir)?;
            println!(":: Cleared {} status", dir);
        }
        return Ok(directions.into_iter().map(|d| (d, None)).collect());
    }

    let mut out = Vec::with_capacity(directions.len());
    for dir in directions {
        let mut status = orch.state().read(dir)?;
        if watch {
            if let Some(current) = status.as_ref().filter(|s| !s.is_terminal()) {
                let pb = spinner(format!("Waiting for {} {}", dir, current.id))?;
                let outcome = orch.poller().wait_for(&current.id, dir).await;
                pb.finish_and_clear();
                match outcome {
                    WatchOutcome::Terminal(s) => status = Some(s),
                    WatchOutcome::TimedOut => println!("   Gave up waiting for {}", dir),
                    WatchOutcome::Superseded | WatchOutcome::Cancelled => {
                        status = orch.state().read(dir)?
                    }
                }
            }
        }
        print_status(dir, status.as_ref());
        out.push((dir, status));
    }
    Ok(out)
}

/// List live notifications; with `purge`, drop the expired ones first.
pub fn cmd_notifications(ctx: &CliContext, purge: bool) -> Result<Vec<Notification>> {
    let orch = ctx.orchestrator()?;
    if purge {
        let removed = orch.notifications().purge_expired()?;
        println!(":: Purged {} expired notifications", removed);
    }

    let live: Vec<Notification> = orch
        .notifications()
        .list()?
        .into_iter()
        .map(|(_, n)| n)
        .collect();
    if live.is_empty() {
        println!(":: No notifications");
    }
    for n in &live {
        let tag = match n.kind {
            NotificationKind::Success => "ok",
            NotificationKind::Error => "error",
        };
        println!(
            "   [{}] {} {}: {}",
            format_millis(Some(n.created_at)),
            n.direction,
            tag,
            n.message
        );
    }
    Ok(live)
}

/// Write local collections as a sync document, to `output` or stdout.
pub fn cmd_export(ctx: &CliContext, output: Option<Utf8PathBuf>) -> Result<SyncDocument> {
    let orch = ctx.orchestrator()?;
    let document = SyncDocument::new(orch.local().load_collections()?);
    let body = document.to_pretty_json()?;

    match output {
        Some(path) => {
            std::fs::write(&path, &body).with_context(|| format!("Failed to write {}", path))?;
            println!(
                ":: Exported {} prompts and {} categories to {} ({})",
                document.prompts.len(),
                document.categories.len(),
                path,
                format_size(body.len(), DECIMAL)
            );
        }
        None => println!("{}", String::from_utf8_lossy(&body)),
    }
    Ok(document)
}

/// Load a sync document from `input` into local collections.
pub fn cmd_import(ctx: &CliContext, input: Utf8PathBuf, mode: CliMergeMode) -> Result<Collections> {
    let bytes = std::fs::read(&input).with_context(|| format!("Failed to read {}", input))?;
    let incoming = SyncDocument::from_slice(&bytes)
        .with_context(|| format!("{} is not a sync document", input))?
        .into_collections();

    let orch = ctx.orchestrator()?;
    let merged = orch
        .local()
        .load_collections()?
        .merged(incoming, mode.into());
    orch.local().save_collections(&merged)?;

    println!(":: Imported {}", input);
    println!("   Prompts:    {}", merged.prompts.len());
    println!("   Categories: {}", merged.categories.len());
    Ok(merged)
}
