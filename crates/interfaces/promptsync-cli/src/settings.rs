use anyhow::{Context, Result};
use promptsync_core::WebDavSettings;

use crate::CliContext;

/// Fields given on the command line; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub server_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub sync_path: Option<String>,
    pub auto_sync: Option<bool>,
}

impl SettingsUpdate {
    pub fn apply(self, mut settings: WebDavSettings) -> WebDavSettings {
        if let Some(url) = self.server_url {
            settings.server_url = Some(url);
        }
        if let Some(user) = self.username {
            settings.username = Some(user);
        }
        if let Some(password) = self.password {
            settings.password = Some(password);
        }
        if let Some(path) = self.sync_path {
            settings.sync_path = path;
        }
        if let Some(auto) = self.auto_sync {
            settings.auto_sync_enabled = auto;
        }
        settings
    }
}

fn show(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => "(not set)",
    }
}

pub fn handle_show(ctx: &CliContext) -> Result<WebDavSettings> {
    let orch = ctx.orchestrator()?;
    let settings = orch.settings()?;
    let password = if settings.password.as_deref().is_some_and(|p| !p.is_empty()) {
        "********"
    } else {
        "(not set)"
    };

    println!(":: WebDAV settings ({})", ctx.db_path);
    println!("   Server URL: {}", show(settings.server_url.as_deref()));
    println!("   Username:   {}", show(settings.username.as_deref()));
    println!("   Password:   {}", password);
    println!("   Sync path:  {}", settings.sync_path);
    println!("   Auto sync:  {}", settings.auto_sync_enabled);
    if !settings.is_configured() {
        println!("   Status:     Incomplete (run `config set`)");
    }
    Ok(settings)
}

/// Merge `update` into the stored settings and persist them.
///
/// Unless `skip_verify` is set, the server must accept the resulting
/// credentials before anything is written.
pub async fn handle_set(
    ctx: &CliContext,
    update: SettingsUpdate,
    skip_verify: bool,
) -> Result<WebDavSettings> {
    let orch = ctx.orchestrator()?;
    let settings = update.apply(orch.settings()?);

    if skip_verify {
        orch.local().save_settings(&settings)?;
        println!(":: Settings saved (not verified)");
    } else {
        println!(":: Verifying credentials...");
        orch.save_settings(&settings)
            .await
            .context("Settings were not saved")?;
        println!(":: Settings verified and saved");
    }
    Ok(settings)
}

pub fn handle_clear(ctx: &CliContext) -> Result<()> {
    let orch = ctx.orchestrator()?;
    orch.local().save_settings(&WebDavSettings::default())?;
    println!(":: Settings cleared");
    Ok(())
}
