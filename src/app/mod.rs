pub mod args;
mod setup;

pub use args::AppArgs;

use anyhow::Result;
use tracing::error;

pub async fn launch() -> Result<()> {
    launch_with_args(AppArgs::from_cli()).await
}

pub async fn launch_with_args(args: AppArgs) -> Result<()> {
    let setup::PreparedApp {
        config,
        addr,
        buffer,
        log_guard,
    } = setup::prepare(args)?;

    let result = crate::web::start_server(buffer, addr, config.cors).await;
    if let Err(e) = &result {
        report_fatal(e);
    }

    // Flush the log file only after the fatal report has been written.
    drop(log_guard);
    result
}

/// Logs the error that is about to end the process.
fn report_fatal(err: &anyhow::Error) {
    error!(fatal = true, exception = ?err, "Log relay terminated unexpectedly");
}
