use crate::config::RelayConfig;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "log-relay")]
#[command(about = "Keeps recent application logs in memory and serves them over HTTP")]
pub struct AppArgs {
    #[arg(long, help = "Config file path (JSON)")]
    pub config: Option<String>,

    #[arg(long, help = "Address to bind the HTTP server to")]
    pub bind: Option<String>,

    #[arg(long, help = "Port to listen on")]
    pub port: Option<u16>,

    #[arg(long, help = "Maximum number of log entries kept in memory")]
    pub capacity: Option<usize>,

    #[arg(
        long = "log-filter",
        help = "Log filter directives, e.g. info,log_relay=debug (or set RUST_LOG)"
    )]
    pub log_filter: Option<String>,

    #[arg(long = "log-dir", help = "Directory for the daily rolling log file")]
    pub log_dir: Option<PathBuf>,

    #[arg(
        long = "no-log-file",
        conflicts_with = "log_dir",
        help = "Do not write logs to a file"
    )]
    pub no_log_file: bool,

    #[arg(long = "no-cors", help = "Disable permissive CORS")]
    pub no_cors: bool,
}

impl AppArgs {
    pub fn from_cli() -> Self {
        <Self as Parser>::parse()
    }

    /// Overrides config values with the flags that were given.
    pub fn apply(&self, config: &mut RelayConfig) {
        if let Some(bind) = &self.bind {
            config.bind = bind.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(capacity) = self.capacity {
            config.capacity = capacity;
        }
        if let Some(filter) = &self.log_filter {
            config.log_filter = filter.clone();
        }
        if let Some(dir) = &self.log_dir {
            config.log_dir = Some(dir.clone());
        }
        if self.no_log_file {
            config.log_dir = None;
        }
        if self.no_cors {
            config.cors = false;
        }
    }
}
