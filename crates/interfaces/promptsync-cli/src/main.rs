use std::time::Duration;

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use promptsync_cli::settings::{self, SettingsUpdate};
use promptsync_cli::{commands, default_db_path, CliContext, CliDirection, CliMergeMode};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Local store file (defaults to the per-user data directory)
    #[arg(long, global = true, env = "PROMPTSYNC_DB")]
    db: Option<Utf8PathBuf>,
    /// Request timeout in seconds; 0 disables it
    #[arg(long, global = true)]
    timeout: Option<u64>,
    /// Extra attempts after a transient network failure
    #[arg(long, global = true, default_value_t = promptsync_config::DEFAULT_MAX_RETRIES)]
    retries: u32,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the stored WebDAV settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Check that the stored credentials reach the server
    Test,
    /// Upload local prompts and categories
    Push,
    /// Download the remote document into local storage
    Pull {
        #[arg(long, value_enum, default_value_t = CliMergeMode::Replace)]
        mode: CliMergeMode,
    },
    /// Show the last push and pull records
    Status {
        #[arg(long, value_enum)]
        direction: Option<CliDirection>,
        /// Poll an in-progress record until it settles
        #[arg(long, conflicts_with = "clear")]
        watch: bool,
        /// Give up watching after this many seconds
        #[arg(long, requires = "watch")]
        watch_timeout: Option<u64>,
        #[arg(long)]
        clear: bool,
    },
    /// List recent sync notifications
    Notifications {
        #[arg(long)]
        purge: bool,
    },
    /// Write local collections as a sync document
    Export {
        #[arg(short, long)]
        output: Option<Utf8PathBuf>,
    },
    /// Load a sync document into local collections
    Import {
        path: Utf8PathBuf,
        #[arg(long, value_enum, default_value_t = CliMergeMode::Append)]
        mode: CliMergeMode,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    Show,
    Set {
        #[arg(long)]
        server_url: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long, env = "PROMPTSYNC_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        #[arg(long)]
        sync_path: Option<String>,
        #[arg(long)]
        auto_sync: Option<bool>,
        /// Save without contacting the server
        #[arg(long)]
        no_verify: bool,
    },
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).context("default subscriber")?;

    let db_path = match cli.db {
        Some(path) => path,
        None => default_db_path()?,
    };
    let mut ctx = CliContext::new(db_path)
        .with_timeout(cli.timeout)
        .with_retries(cli.retries);

    match cli.command {
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                settings::handle_show(&ctx)?;
            }
            ConfigCommands::Set {
                server_url,
                username,
                password,
                sync_path,
                auto_sync,
                no_verify,
            } => {
                let update = SettingsUpdate {
                    server_url,
                    username,
                    password,
                    sync_path,
                    auto_sync,
                };
                settings::handle_set(&ctx, update, no_verify).await?;
            }
            ConfigCommands::Clear => settings::handle_clear(&ctx)?,
        },
        Commands::Test => commands::cmd_test(&ctx).await?,
        Commands::Push => {
            commands::cmd_push(&ctx).await?;
        }
        Commands::Pull { mode } => {
            commands::cmd_pull(&ctx, mode).await?;
        }
        Commands::Status {
            direction,
            watch,
            watch_timeout,
            clear,
        } => {
            ctx.options.watch_timeout = watch_timeout.map(Duration::from_secs);
            commands::cmd_status(&ctx, direction, watch, clear).await?;
        }
        Commands::Notifications { purge } => {
            commands::cmd_notifications(&ctx, purge)?;
        }
        Commands::Export { output } => {
            commands::cmd_export(&ctx, output)?;
        }
        Commands::Import { path, mode } => {
            commands::cmd_import(&ctx, path, mode)?;
        }
    }

    Ok(())
}
