use d_config::agent::AgentRuntime;
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
    let _guard = init_observability("agent", &settings.log)?;
    info!(name = %settings.agent.name, controller = %settings.agent.controller_url, "agent starting");

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = graceful_shutdown(shutdown).await {
                error!("Failed to shutdown: {:?}", e);
            }
        });
    }

    let runtime = AgentRuntime::from_settings(&settings)?;
    if let Err(e) = runtime.run(shutdown).await {
        error!("agent stops: {:?}", e);
        return Err(e);
    }

    info!("Exiting program.");
    Ok(())
}
