//! PvSight Bridge Framework
//!
//! Common plumbing for bridges that publish device telemetry over Zenoh.
//!
//! # Overview
//!
//! This framework provides:
//! - [`BridgeConfig`] trait for configuration loading and validation
//! - [`TransportPublisher`] and its Zenoh implementation [`ZenohPublisher`]
//! - [`LinkState`] for connection state reporting
//! - [`shutdown_token`] for cooperative shutdown on Ctrl+C / SIGTERM
//! - [`BridgeArgs`] for common CLI argument parsing
//!
//! # Example
//!
//! ```ignore
//! use pvsight_bridge_framework::{BridgeArgs, BridgeConfig, ZenohPublisher, shutdown_token};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = BridgeArgs::parse_with_default("mybridge.json5");
//!     let config = MyBridgeConfig::load(&args.config)?;
//!     pvsight_common::init_tracing(&args.logging(config.logging()))?;
//!
//!     let publisher = ZenohPublisher::new(config.zenoh().clone());
//!     let stop = shutdown_token();
//!     // Hand the publisher and token to the bridge's supervisor.
//!     Ok(())
//! }
//! ```

mod args;
mod config;
mod error;
mod link;
mod publisher;
mod shutdown;

pub use args::BridgeArgs;
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use link::LinkState;
pub use publisher::{Qos, TransportPublisher, ZenohPublisher};
pub use shutdown::{shutdown_token, wait_for_signal};

// Re-export commonly used types from pvsight-common
pub use pvsight_common::{LogFormat, LoggingConfig, TelemetryPayload, TlsConfig, ZenohConfig};

// Re-exported so implementors of the publisher trait don't need their own dependency.
pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;
