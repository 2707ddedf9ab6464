use d_config::utils::observability::init_observability;
use d_config::utils::signal::graceful_shutdown;
use d_config::worker::Worker;
use d_config::Result;
use d_config::Settings;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::new()?.validate()?;
    let _guard = init_observability("worker", &settings.log)?;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = graceful_shutdown(shutdown).await {
                error!("Failed to shutdown: {:?}", e);
            }
        });
    }

    Worker::new(&settings, shutdown).serve().await?;

    info!("Exiting program.");
    Ok(())
}
