use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::Error;
use crate::Result;

/// Waits for SIGINT, SIGTERM or Ctrl-C and cancels `shutdown`.
pub async fn graceful_shutdown(shutdown: CancellationToken) -> Result<()> {
    let mut sigint =
        signal(SignalKind::interrupt()).map_err(|e| Error::Fatal(format!("failed to install SIGINT handler: {e}")))?;
    let mut sigterm =
        signal(SignalKind::terminate()).map_err(|e| Error::Fatal(format!("failed to install SIGTERM handler: {e}")))?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
        _ = shutdown.cancelled() => return Ok(()),
    }

    info!("Shutdown server..");
    shutdown.cancel();
    Ok(())
}
