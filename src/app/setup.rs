//! This module handles the initial setup of the application.
use super::args::AppArgs;
use crate::config::RelayConfig;
use crate::logging::{LogBuffer, LogCollector};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_FILE_PREFIX: &str = "logs";
const LOG_FILE_SUFFIX: &str = "txt";

/// Contains all the necessary components for the relay to run.
pub struct PreparedApp {
    /// The resolved configuration.
    pub config: RelayConfig,
    /// The address the HTTP server binds to.
    pub addr: SocketAddr,
    /// The buffer shared by the logging pipeline and the web layer.
    pub buffer: Arc<LogBuffer>,
    /// Flushes the log file writer when dropped; keep it alive while serving.
    pub log_guard: Option<WorkerGuard>,
}

/// Prepares the application for running.
///
/// This function performs the following steps:
/// 1. Resolves the configuration from defaults, file, environment and flags.
/// 2. Validates it.
/// 3. Creates the shared log buffer.
/// 4. Configures logging to the console, the rolling log file and the buffer.
/// 5. Prints a start banner.
///
/// # Errors
///
/// This function will return an error if the configuration is invalid or the
/// global subscriber cannot be installed.
pub fn prepare(args: AppArgs) -> Result<PreparedApp> {
    let config = resolve_config(&args, std::env::var("RUST_LOG").ok())?;
    config.validate()?;

    let addr = config.socket_addr()?;
    let buffer = Arc::new(LogBuffer::new(config.capacity)?);

    let log_guard = configure_logging(
        &config.log_filter,
        config.log_dir.as_deref(),
        buffer.clone(),
    )?;
    print_start_banner(&config, addr);

    Ok(PreparedApp {
        config,
        addr,
        buffer,
        log_guard,
    })
}

/// Resolves the configuration.
///
/// `RUST_LOG` replaces the file's log filter but not an explicit
/// `--log-filter`.
pub fn resolve_config(args: &AppArgs, env_filter: Option<String>) -> Result<RelayConfig> {
    let mut config = match &args.config {
        Some(path) => RelayConfig::load(path)?,
        None => RelayConfig::default(),
    };

    if let Some(filter) = env_filter {
        config.log_filter = filter;
    }
    args.apply(&mut config);

    Ok(config)
}

/// Installs the global subscriber: console output, an optional daily log
/// file under `log_dir`, and capture into `buffer`.
fn configure_logging(
    filter: &str,
    log_dir: Option<&Path>,
    buffer: Arc<LogBuffer>,
) -> Result<Option<WorkerGuard>> {
    let console = tracing_subscriber::fmt::layer().with_filter(parse_filter(filter)?);

    let (file, guard) = match log_dir {
        Some(dir) => {
            let (writer, guard) = tracing_appender::non_blocking(daily_log_file(dir)?);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(parse_filter(filter)?);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let capture = LogCollector::new(buffer).with_filter(parse_filter(filter)?);

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .with(capture)
        .try_init()
        .context("failed to install the tracing subscriber")?;

    Ok(guard)
}

/// Opens a log file in `dir` that rolls over daily, named
/// `logs.<date>.txt`.
pub fn daily_log_file(dir: &Path) -> Result<RollingFileAppender> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .build(dir)
        .with_context(|| format!("failed to open log file in {}", dir.display()))
}

fn parse_filter(filter: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(filter).with_context(|| format!("invalid log filter '{}'", filter))
}

/// Prints a banner with startup information.
fn print_start_banner(config: &RelayConfig, addr: SocketAddr) {
    println!("📜 Starting log relay");
    println!("Logs: http://{}/logs", addr);
    println!("Live updates: ws://{}/logs/ws", addr);
    println!("Capacity: {} entries", config.capacity);
    println!("Log filter: {}", config.log_filter);
    match &config.log_dir {
        Some(dir) => println!("Log files: {}", dir.display()),
        None => println!("Log files: off"),
    }
    println!("CORS: {}", if config.cors { "permissive" } else { "off" });
    println!();
}
