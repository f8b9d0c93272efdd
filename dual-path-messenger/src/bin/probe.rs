//! Standalone messenger process: starts the dual-path messenger from
//! configuration and logs its health summary until Ctrl-C.

use dual_path_messenger::{Messenger, MessengerConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = match std::env::var("DUAL_PATH_CONFIG") {
        Ok(path) => {
            info!("Loading configuration from {}", path);
            MessengerConfig::from_file(path)?
        }
        Err(_) => MessengerConfig::from_env()?,
    };

    info!(
        "Configuration loaded - xApp: {}, primary: {}, {} endpoint(s)",
        config.xapp_name,
        config.primary_url,
        config.endpoints.len()
    );

    let interval = config.health_check_interval();
    let messenger = Messenger::new(config)?;
    messenger.start().await?;

    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match messenger.health_summary().to_json() {
                    Ok(summary) => info!("Health summary: {}", summary),
                    Err(e) => error!("Failed to render health summary: {}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    messenger.stop().await;
    Ok(())
}
