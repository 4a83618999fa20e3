//! imex: drive imports and exports against a local station from a shell.
//!
//! Each invocation builds the whole stack in-process (pool, in-memory status
//! store, directory station), submits one task, polls its status until it is
//! terminal, prints the result as JSON, and shuts the pool down.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use imex_core::impls::{InMemoryStatusStore, LocalStation, StaticContext};
use imex_core::ports::{FileUpload, SystemClock};
use imex_core::{
    BuildError, CallContext, ConfigError, ImexConfig, ImexError, ImexHandler, TaskExecutor,
    TaskKey, TaskResult, TaskStatus, UserInfo,
};
use thiserror::Error;
use tokio::time::{Duration, Instant, sleep};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod demo;

use demo::CsvDemoHooks;

/// Asynchronous CSV import/export demo
#[derive(Parser)]
#[command(name = "imex")]
#[command(about = "Submit import/export tasks and poll them to completion", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory backing the transaction station
    #[arg(long, global = true, default_value = "./station")]
    station_dir: PathBuf,

    /// Prefix for download URLs (e.g. https://files.example.com)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// JSON config file (executor / status / export sections)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Tenant code recorded on the task
    #[arg(long, global = true, default_value = "default")]
    mart: String,

    #[arg(long, global = true, default_value = "en")]
    language: String,

    #[arg(long, global = true, default_value = "cli")]
    user: String,

    /// Status poll interval in milliseconds
    #[arg(long, global = true, default_value_t = 200)]
    poll_ms: u64,

    /// Give up polling after this many seconds
    #[arg(long, global = true, default_value_t = 300)]
    timeout_secs: u64,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export synthetic order rows to the station
    Export {
        /// Number of rows to write
        #[arg(long)]
        rows: u64,

        /// Target file name; the extension is kept
        #[arg(long, default_value = "orders.csv")]
        file: String,

        /// Refuse exports with more rows than this
        #[arg(long)]
        limit: Option<u64>,
    },

    /// Import a CSV file
    Import {
        path: PathBuf,

        /// Park the file in the station and let the worker pull it back
        #[arg(long)]
        staged: bool,

        /// Keep the staged copy after parsing
        #[arg(long, requires = "staged")]
        keep_staged: bool,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Submit(#[from] ImexError),

    #[error("task {0} did not finish in time")]
    Timeout(TaskKey),

    #[error("task {key} ended {status}: {msg}")]
    TaskFailed {
        key: TaskKey,
        status: TaskStatus,
        msg: String,
    },

    #[error("failed to print result: {0}")]
    Output(#[from] serde_json::Error),
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    // RUST_LOG で調整可能
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "imex failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = match &cli.config {
        Some(path) => ImexConfig::from_json_file(path)?,
        None => ImexConfig::default(),
    };

    let hooks = match &cli.command {
        Commands::Export { rows, limit, .. } => CsvDemoHooks::new(*rows, *limit),
        Commands::Import { keep_staged, .. } => {
            CsvDemoHooks::new(0, None).keep_staged(*keep_staged)
        }
    };

    let mut station = LocalStation::new(&cli.station_dir);
    if let Some(base_url) = &cli.base_url {
        station = station.with_base_url(base_url);
    }

    let executor = Arc::new(TaskExecutor::from_config(&config.executor));
    let context = StaticContext::new(CallContext {
        mart: cli.mart.clone(),
        language: cli.language.clone(),
        user: UserInfo::new(&cli.user),
    });

    let handler = Arc::new(
        ImexHandler::builder(Arc::new(hooks))
            .config(config)
            .executor(executor)
            .status_store(Arc::new(InMemoryStatusStore::new(SystemClock)))
            .station(Arc::new(station))
            .context(Arc::new(context))
            .build()?,
    );

    let key = match cli.command {
        Commands::Export { file, .. } => handler.download(None, &file)?,
        Commands::Import { path, staged, .. } => {
            let upload = FileUpload::new(path);
            if staged {
                handler.upload_staged(upload)?
            } else {
                handler.upload(upload)?
            }
        }
    };
    info!(task_key = %key, "submitted");

    let polled = poll(
        &handler,
        &key,
        Duration::from_millis(cli.poll_ms),
        Duration::from_secs(cli.timeout_secs),
    )
    .await;

    let drained = tokio::task::spawn_blocking({
        let handler = Arc::clone(&handler);
        move || handler.shutdown(Duration::from_secs(10))
    })
    .await
    .unwrap_or(false);
    if !drained {
        error!("executor did not shut down cleanly");
    }

    let result = polled.ok_or_else(|| CliError::Timeout(key.clone()))?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    match result.status {
        TaskStatus::Done => Ok(()),
        status => Err(CliError::TaskFailed {
            key,
            status,
            msg: result.msg,
        }),
    }
}

/// Poll until the task is terminal. An EXPIRED read also ends the wait.
async fn poll(
    handler: &ImexHandler,
    key: &TaskKey,
    interval: Duration,
    timeout: Duration,
) -> Option<TaskResult> {
    let deadline = Instant::now() + timeout;
    loop {
        let result = handler.status(key);
        if result.is_terminal() || result.status == TaskStatus::Expired {
            return Some(result);
        }
        if Instant::now() >= deadline {
            return None;
        }
        sleep(interval).await;
    }
}
