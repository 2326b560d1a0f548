//! Zenoh bridge for PV inverter telemetry.
//!
//! Polls an inverter over Modbus (TCP/RTU) and publishes snapshots to Zenoh.

use anyhow::{Context, Result};
use tracing::info;

use pvsight_bridge_framework::{BridgeArgs, BridgeConfig, ZenohPublisher, shutdown_token};
use zenoh_bridge_inverter::config::InverterBridgeConfig;
use zenoh_bridge_inverter::{ModbusDeviceLink, PollingSupervisor, SnapshotCollector};

#[tokio::main]
async fn main() -> Result<()> {
    let args = BridgeArgs::parse_with_default("inverter.json5");

    // Load configuration
    let config = InverterBridgeConfig::load(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    // Initialize logging
    pvsight_common::init_tracing(&args.logging(&config.logging))
        .context("Failed to init tracing")?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting zenoh-bridge-inverter");
    info!("Loaded configuration from {:?}", args.config);

    let map = config
        .inverter
        .register_map()
        .context("Invalid register map")?;

    let mut supervisor = PollingSupervisor::new(
        SnapshotCollector::new(map),
        ModbusDeviceLink::new(&config.inverter),
        ZenohPublisher::new(config.zenoh.clone()),
        config.inverter.supervisor_settings(),
        shutdown_token(),
    );

    let stats = supervisor.run().await.context("Inverter bridge failed to start")?;

    info!(
        published = stats.published,
        failed = stats.failed,
        "Inverter bridge stopped"
    );

    Ok(())
}
