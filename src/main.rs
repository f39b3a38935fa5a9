//! The main entry point for the log-relay application.
use anyhow::Result;

/// The main function of the application.
///
/// Resolves configuration, installs logging into the shared buffer, and
/// serves the buffer over HTTP until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the server fails to
/// start.
#[tokio::main]
async fn main() -> Result<()> {
    log_relay::app::launch().await
}
