//! Rescue server binary
//!
//! Serves the simulation API configured from `RESCUE_*` environment variables.

use rescue_server::{RescueServer, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rescue_server=info,rescue_run=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    tracing::info!(
        maps = %config.maps_dir.display(),
        scenario = %config.scenario_file.display(),
        max_steps = config.run.max_steps,
        "Starting rescue server"
    );

    RescueServer::new(config).serve().await?;
    Ok(())
}
