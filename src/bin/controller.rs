use d_config::controller::ControllerBuilder;
use d_config::utils::observability::init_observability;
use d_config::utils::signal::graceful_shutdown;
use d_config::Result;
use d_config::Settings;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::new()?.validate()?;

    // Initializing Logs
    let _guard = init_observability("controller", &settings.log)?;
    info!(?settings, "controller starting");

    // Initializing Shutdown Signal
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = graceful_shutdown(shutdown).await {
                error!("Failed to shutdown: {:?}", e);
            }
        });
    }

    let controller = ControllerBuilder::new(settings, shutdown.clone()).build().await?;
    if let Err(e) = controller.serve().await {
        error!("controller stops: {:?}", e);
        shutdown.cancel();
        return Err(e);
    }

    info!("Exiting program.");
    Ok(())
}
