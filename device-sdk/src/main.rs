use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use device_sdk::autoevent::SchedulerRegistry;
use device_sdk::config::{CONFIG_PATH_ENV, SdkConfig};
use device_sdk::driver::{DriverReadGateway, SimpleDriver};
use device_sdk::logging::init_logging;
use device_sdk::publisher;
use device_sdk::service::ServiceState;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const DEFAULT_CONFIG_PATH: &str = "config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_PATH_ENV).ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let config = SdkConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    // Keep the guard alive so buffered file logs are flushed on exit.
    let (_logging, _guard) = init_logging(&config.logging)?;
    info!(
        path = %config_path.display(),
        devices = config.devices.len(),
        profiles = config.profiles.len(),
        "Configuration loaded"
    );

    let service = Arc::new(ServiceState::new(
        config.service.name.clone(),
        config.service.admin_state,
    ));
    let reader = Arc::new(DriverReadGateway::new(Arc::new(SimpleDriver::new()), &config));
    let publisher = publisher::from_config(&config.service)?;

    let shutdown = CancellationToken::new();
    let mut registry =
        SchedulerRegistry::from_config(&config, reader, publisher, service.clone(), &shutdown)?;
    registry.register_all(&config).await;

    info!(
        service = %service.name(),
        admin_state = %service.admin_state(),
        schedules = registry.len(),
        "Device service started"
    );

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Shutdown signal received");

    let report = registry.shutdown().await;
    if report.abandoned_dispatches > 0 {
        warn!(pending = report.abandoned_dispatches, "Some events were not published");
    }

    info!("Device service stopped");
    Ok(())
}
