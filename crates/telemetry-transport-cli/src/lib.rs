//! # Telemetry Transport CLI
//!
//! Command-line interface for the telemetry transport.
//!
//! This module provides CLI commands for:
//! - Sending payloads from a file or stdin
//! - Flushing the persisted delivery queue
//! - Inspecting and clearing the persisted queue
//! - Configuration validation

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use telemetry_transport::{
    DeliveryQueue, FilesystemStorage, Priority, QueueItem, SendOutcome, Storage, StorageError,
    Transport, TransportConfig, TransportError,
};
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Prefix of environment variables that override configuration values
pub const ENV_PREFIX: &str = "TELEMETRY";

// ============================================================================
// CLI Structure
// ============================================================================

/// Telemetry Transport CLI - deliver and inspect queued telemetry
#[derive(Parser, Debug)]
#[command(name = "telemetry-transport")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Deliver telemetry payloads and manage the offline queue")]
pub struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long, env = "TELEMETRY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logging level
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Directory holding the persisted queue
    #[arg(long, env = "TELEMETRY_STORAGE_DIR", default_value = "./.telemetry")]
    pub storage_dir: PathBuf,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a JSON payload; an array is sent as one batch
    Send {
        /// File holding the payload; reads stdin when omitted
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Queue the payload with this priority and flush instead of sending directly
        #[arg(short, long)]
        priority: Option<u32>,
    },

    /// Deliver everything in the persisted queue
    Flush,

    /// Persisted queue commands
    Queue {
        #[command(subcommand)]
        action: QueueCommands,
    },

    /// Validate configuration
    Config {
        /// Show resolved configuration
        #[arg(short, long)]
        show: bool,
    },
}

/// Persisted queue subcommands
#[derive(Subcommand, Debug)]
pub enum QueueCommands {
    /// Show the size and contents of the queue
    Status {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Discard every queued item
    Clear,
}

/// Output format options
#[derive(Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Command failed: {message}")]
    CommandFailed { message: String },

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 1,
            Self::Transport(_) => 2,
            Self::CommandFailed { .. } => 3,
            Self::InvalidArgument { .. } => 4,
            Self::Io(_) => 5,
            Self::Storage(_) => 6,
        }
    }
}

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] telemetry_transport::ConfigError),
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;

    let config = load_configuration(cli.config.as_deref())?;
    let report = execute_command(&cli, config).await?;
    println!("{}", report);

    Ok(())
}

/// Run the parsed command and return the text to print
pub async fn execute_command(cli: &Cli, config: TransportConfig) -> Result<String, CliError> {
    match &cli.command {
        Commands::Send { file, priority } => {
            execute_send_command(config, &cli.storage_dir, file.as_deref(), *priority).await
        }
        Commands::Flush => execute_flush_command(config, &cli.storage_dir).await,
        Commands::Queue { action } => execute_queue_command(config, &cli.storage_dir, action).await,
        Commands::Config { show } => execute_config_command(&config, *show),
    }
}

/// Initialize logging based on CLI arguments
///
/// `RUST_LOG` takes precedence over `--log-level`. Logs go to stderr so that
/// command output on stdout stays machine readable.
fn initialize_logging(cli: &Cli) -> Result<(), CliError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    let result = if cli.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    result.map_err(|e| CliError::CommandFailed {
        message: format!("Failed to initialize logging: {}", e),
    })
}

/// Load configuration from a TOML file and `TELEMETRY__` environment variables
///
/// Without an explicit path, `./telemetry.toml` is used when present. Every
/// field has a default, so an empty environment still yields a configuration;
/// whether it is usable is checked when the transport is built.
pub fn load_configuration(config_path: Option<&Path>) -> Result<TransportConfig, ConfigError> {
    let mut builder = config::Config::builder();

    builder = match config_path {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::FileNotFound {
                    path: path.to_path_buf(),
                });
            }
            info!(path = %path.display(), "Loading configuration from explicit path");
            builder.add_source(
                config::File::from(path)
                    .required(true)
                    .format(config::FileFormat::Toml),
            )
        }
        None => builder.add_source(
            config::File::with_name("telemetry")
                .required(false)
                .format(config::FileFormat::Toml),
        ),
    };

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn open_transport(config: TransportConfig, storage_dir: &Path) -> Result<Transport, CliError> {
    let storage = FilesystemStorage::new(storage_dir.to_path_buf()).await?;
    debug!(storage_dir = %storage_dir.display(), "Opened queue storage");

    Ok(Transport::builder(config)
        .storage(Arc::new(storage))
        .build()
        .await?)
}

async fn read_payload(file: Option<&Path>) -> Result<Value, CliError> {
    let (source, text) = match file {
        Some(path) => (
            path.display().to_string(),
            tokio::fs::read_to_string(path).await?,
        ),
        None => {
            let mut text = String::new();
            tokio::io::stdin().read_to_string(&mut text).await?;
            ("stdin".to_string(), text)
        }
    };

    serde_json::from_str(&text).map_err(|e| CliError::InvalidArgument {
        arg: source,
        message: format!("payload is not valid JSON: {}", e),
    })
}

/// Execute send command
async fn execute_send_command(
    config: TransportConfig,
    storage_dir: &Path,
    file: Option<&Path>,
    priority: Option<u32>,
) -> Result<String, CliError> {
    let payload = read_payload(file).await?;
    let transport = open_transport(config, storage_dir).await?;

    if let Some(priority) = priority {
        let payloads = match payload {
            Value::Array(items) => items,
            single => vec![single],
        };
        let count = payloads.len();
        for payload in payloads {
            transport.enqueue(payload, Priority::new(priority)).await?;
        }
        info!(count, priority, "Queued payloads");
        return execute_flush(&transport).await;
    }

    let outcome = match payload {
        Value::Array(items) => transport.send_batch(items).await,
        single => transport.send(single).await,
    };

    match outcome {
        SendOutcome::Failed { error } => Err(CliError::Transport(error)),
        other => Ok(other.message()),
    }
}

/// Execute flush command
async fn execute_flush_command(
    config: TransportConfig,
    storage_dir: &Path,
) -> Result<String, CliError> {
    let transport = open_transport(config, storage_dir).await?;
    execute_flush(&transport).await
}

async fn execute_flush(transport: &Transport) -> Result<String, CliError> {
    let outcomes = transport.flush().await?;

    let delivered: usize = outcomes
        .iter()
        .filter(|outcome| outcome.is_success())
        .map(|outcome| outcome.attempted.len())
        .sum();
    let requeued: usize = outcomes.iter().map(|outcome| outcome.requeued.len()).sum();
    let dropped: usize = outcomes.iter().map(|outcome| outcome.dropped.len()).sum();
    let remaining = transport.queue_size().await?;

    Ok(format!(
        "Flushed {} batch(es): {} delivered, {} requeued, {} dropped, {} remaining",
        outcomes.len(),
        delivered,
        requeued,
        dropped,
        remaining
    ))
}

/// Queue contents as printed by `queue status --format json`
#[derive(Debug, Serialize)]
pub struct QueueReport {
    pub size: usize,
    pub items: Vec<QueueItem>,
}

/// Execute queue commands
///
/// These read and write the persisted queue directly, so they work without
/// a usable endpoint.
async fn execute_queue_command(
    config: TransportConfig,
    storage_dir: &Path,
    action: &QueueCommands,
) -> Result<String, CliError> {
    let storage = FilesystemStorage::new(storage_dir.to_path_buf()).await?;

    match action {
        QueueCommands::Status { format } => {
            let queue = load_persisted_queue(&storage, &config).await?;
            let report = QueueReport {
                size: queue.len(),
                items: queue.items().to_vec(),
            };
            format_queue_report(&report, format)
        }
        QueueCommands::Clear => {
            let size = match load_persisted_queue(&storage, &config).await {
                Ok(queue) => queue.len(),
                Err(e) => {
                    warn!(error = %e, "Persisted queue is unreadable, clearing anyway");
                    0
                }
            };
            storage.remove_item(&config.storage_key).await?;
            info!(count = size, "Cleared persisted queue");
            Ok(format!("Cleared {} queued item(s)", size))
        }
    }
}

async fn load_persisted_queue(
    storage: &FilesystemStorage,
    config: &TransportConfig,
) -> Result<DeliveryQueue, CliError> {
    let Some(json) = storage.get_item(&config.storage_key).await? else {
        return Ok(DeliveryQueue::new(config.max_queue_size));
    };

    let (queue, dropped) = DeliveryQueue::from_json(&json, config.max_queue_size)?;
    if dropped > 0 {
        warn!(
            dropped,
            max_queue_size = config.max_queue_size,
            "Persisted queue exceeds max_queue_size, overflow not shown"
        );
    }
    Ok(queue)
}

fn format_queue_report(report: &QueueReport, format: &OutputFormat) -> Result<String, CliError> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(report).map_err(|e| CliError::CommandFailed {
                message: format!("Failed to render queue report: {}", e),
            })
        }
        OutputFormat::Text => {
            let mut lines = vec![format!("{} item(s) queued", report.size)];
            for item in &report.items {
                lines.push(format!(
                    "{}  priority={}  retries={}  created={}",
                    item.id,
                    item.priority.value(),
                    item.retry_count,
                    item.created_at
                ));
            }
            Ok(lines.join("\n"))
        }
    }
}

/// Execute config command
fn execute_config_command(config: &TransportConfig, show: bool) -> Result<String, CliError> {
    config.validate().map_err(ConfigError::from)?;

    if !show {
        return Ok("Configuration is valid".to_string());
    }

    let mut rendered = serde_json::to_value(config).map_err(|e| CliError::CommandFailed {
        message: format!("Failed to render configuration: {}", e),
    })?;
    if let Some(api_key) = rendered.get_mut("api_key") {
        if !config.api_key.is_empty() {
            *api_key = Value::String("<REDACTED>".to_string());
        }
    }

    serde_json::to_string_pretty(&rendered).map_err(|e| CliError::CommandFailed {
        message: format!("Failed to render configuration: {}", e),
    })
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
