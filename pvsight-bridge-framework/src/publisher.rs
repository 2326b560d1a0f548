//! Telemetry publisher for the pub/sub sink.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use zenoh::bytes::Encoding;
use zenoh::qos::{CongestionControl, Reliability};

use pvsight_common::ZenohConfig;

use crate::error::{BridgeError, Result};
use crate::link::LinkState;

/// Delivery guarantee requested for a publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Qos {
    /// Fire and forget; dropped under congestion.
    AtMostOnce,
    /// Reliable delivery; the publish waits for room instead of dropping.
    #[default]
    AtLeastOnce,
}

impl Qos {
    /// Congestion behaviour used for this QoS.
    pub fn congestion_control(self) -> CongestionControl {
        match self {
            Qos::AtMostOnce => CongestionControl::Drop,
            Qos::AtLeastOnce => CongestionControl::Block,
        }
    }

    /// Link reliability used for this QoS.
    pub fn reliability(self) -> Reliability {
        match self {
            Qos::AtMostOnce => Reliability::BestEffort,
            Qos::AtLeastOnce => Reliability::Reliable,
        }
    }
}

/// Stateful connection to the telemetry sink.
///
/// Implementations are owned by a single caller; `&mut self` serialises
/// every call on one link.
#[async_trait]
pub trait TransportPublisher: Send {
    /// Open an authenticated session. Fails with [`BridgeError::AlreadyConnected`]
    /// if a session is already open.
    async fn connect(&mut self) -> Result<()>;

    /// Send one message. No retry is attempted on top of the transport's own.
    ///
    /// With [`Qos::AtLeastOnce`] a message that cannot reach the broker is
    /// reported as an error rather than dropped.
    async fn publish(&mut self, topic: &str, payload: Vec<u8>, qos: Qos) -> Result<()>;

    /// Close the session. Best-effort; errors are logged, never returned.
    async fn disconnect(&mut self);

    /// Current link state.
    fn state(&self) -> LinkState;
}

/// [`TransportPublisher`] backed by a Zenoh session.
pub struct ZenohPublisher {
    config: ZenohConfig,
    session: Option<zenoh::Session>,
}

impl ZenohPublisher {
    /// Create a disconnected publisher for the given endpoint settings.
    pub fn new(config: ZenohConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    /// Get a reference to the open Zenoh session, if any.
    pub fn session(&self) -> Option<&zenoh::Session> {
        self.session.as_ref()
    }
}

#[async_trait]
impl TransportPublisher for ZenohPublisher {
    async fn connect(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Err(BridgeError::AlreadyConnected);
        }

        let session = pvsight_common::connect(&self.config).await?;
        self.session = Some(session);
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: Vec<u8>, qos: Qos) -> Result<()> {
        let session = self.session.as_ref().ok_or(BridgeError::NotConnected)?;

        // A client-mode put with no router is silently dropped by Zenoh.
        if qos == Qos::AtLeastOnce && self.config.mode == "client" {
            let mut routers = session.info().routers_zid().await;
            if routers.next().is_none() {
                return Err(BridgeError::Publish {
                    key: topic.to_string(),
                    message: "No router connected".to_string(),
                });
            }
        }

        session
            .put(topic, payload)
            .encoding(Encoding::APPLICATION_JSON)
            .congestion_control(qos.congestion_control())
            .reliability(qos.reliability())
            .await
            .map_err(|e| BridgeError::Publish {
                key: topic.to_string(),
                message: e.to_string(),
            })
    }

    async fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.close().await {
                tracing::warn!(error = %e, "Error closing Zenoh session");
            } else {
                tracing::info!("Zenoh session closed");
            }
        }
    }

    fn state(&self) -> LinkState {
        if self.session.is_some() {
            LinkState::Connected
        } else {
            LinkState::Disconnected
        }
    }
}
