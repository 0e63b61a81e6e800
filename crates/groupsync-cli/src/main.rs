//! groupsync - keep the groups of a merged course in line with enrollment.
//!
//! Given a parent course id, makes sure the parent and each merged child
//! course has a group in the managed group set, then moves every student
//! into the group of the course they are actually enrolled in.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use groupsync_core::{ApiClient, Config, MatchPolicy, Reconciler, SyncOptions};

#[derive(Debug, Parser)]
#[command(name = "groupsync", version, about = "Sync merged child course groups with enrollments")]
struct Cli {
    /// Course id of the merged parent course
    course_id: String,

    /// Path to the JSON config file
    config: Option<PathBuf>,

    /// Print the plans as JSON without changing anything
    #[arg(long)]
    dry_run: bool,

    /// How a student in several groups is judged: first-match or prefer-correct
    #[arg(long, default_value_t = MatchPolicy::FirstMatch)]
    policy: MatchPolicy,

    /// Also append log lines to this file
    #[arg(long, env = "GROUPSYNC_LOG_FILE")]
    log_file: Option<PathBuf>,
}

/// Open `path` for appending log lines, creating its directory if needed.
fn log_file_appender(path: &Path) -> Result<RollingFileAppender> {
    let dir = path.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let name = path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Log file path has no file name"))?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name.to_string_lossy())
        .build(dir)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// Initialize the tracing subscriber for logging
///
/// `RUST_LOG` wins over the configured level. The returned guard flushes the
/// file writer and must live until exit.
fn init_tracing(level: Option<&str>, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.unwrap_or("info")))
        .context("Invalid log level")?;

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(log_file_appender(path)?);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    config.validate()?;

    let log_file = cli.log_file.as_deref().or(config.log_file.as_deref());
    let _guard = init_tracing(config.log_level.as_deref(), log_file)?;
    info!(course = %cli.course_id, dry_run = cli.dry_run, policy = %cli.policy, "groupsync starting");

    let client = ApiClient::new(&config).context("Failed to build the directory client")?;
    let options = SyncOptions {
        dry_run: cli.dry_run,
        policy: cli.policy,
    };

    let report = match Reconciler::new(&client, options).run(&cli.course_id).await {
        Ok(report) => report,
        Err(e) => {
            error!(
                course = %cli.course_id,
                kind = ?e.kind(),
                status = ?e.status(),
                error = %e,
                "Sync aborted"
            );
            return Err(e.into());
        }
    };

    if cli.dry_run {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    info!(course = %cli.course_id, "groupsync finished");
    Ok(())
}
