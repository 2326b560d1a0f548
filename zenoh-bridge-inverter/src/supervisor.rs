//! Poll/decode/publish loop.
//!
//! The supervisor owns both links for their whole lifetime and runs one
//! cycle at a time:
//!
//! ```text
//! Starting -> Running -> Draining -> Stopped
//! ```
//!
//! A stop request is honoured before a cycle starts and during the wait
//! between cycles. An in-flight read or publish always runs to completion
//! (or its own timeout). The supervisor never reconnects a link itself: a
//! dropped device link shows up as absent fields until its own reopen succeeds,
//! and a dropped transport as failed publishes.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use pvsight_bridge_framework::{BridgeError, Qos, TransportPublisher};

use crate::collector::SnapshotCollector;
use crate::device::{DeviceLink, DeviceLinkError};

/// Supervisor lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Starting,
    Running,
    Draining,
    Stopped,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        };
        write!(f, "{}", s)
    }
}

/// Fatal startup errors.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Failed to connect to device: {0}")]
    DeviceStart(#[source] DeviceLinkError),
    #[error("Failed to connect to telemetry sink: {0}")]
    TransportStart(#[source] BridgeError),
}

/// Per-cycle errors. Logged and counted, never fatal.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("Failed to encode snapshot: {0}")]
    Encode(#[from] pvsight_common::Error),
    #[error(transparent)]
    Publish(#[from] BridgeError),
}

/// Publishing and timing settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisorSettings {
    /// Key expression the snapshot is published on.
    pub topic: String,
    /// Delivery guarantee for each publish.
    pub qos: Qos,
    /// Wait between the end of one cycle and the start of the next.
    pub interval: Duration,
}

/// Counters over the supervisor's lifetime.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    /// Cycles whose snapshot was published.
    pub published: u64,
    /// Cycles whose snapshot was lost.
    pub failed: u64,
}

impl CycleStats {
    /// Total number of completed cycles.
    pub fn total(&self) -> u64 {
        self.published + self.failed
    }
}

/// Top-level polling loop.
pub struct PollingSupervisor<L, P> {
    collector: SnapshotCollector,
    link: L,
    publisher: P,
    settings: SupervisorSettings,
    shutdown: CancellationToken,
    state: SupervisorState,
    stats: CycleStats,
}

impl<L, P> PollingSupervisor<L, P>
where
    L: DeviceLink,
    P: TransportPublisher,
{
    pub fn new(
        collector: SnapshotCollector,
        link: L,
        publisher: P,
        settings: SupervisorSettings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            collector,
            link,
            publisher,
            settings,
            shutdown,
            state: SupervisorState::Starting,
            stats: CycleStats::default(),
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    fn transition(&mut self, next: SupervisorState) {
        info!(from = %self.state, to = %next, "Supervisor state change");
        self.state = next;
    }

    /// Connect both links. Either failure is fatal; nothing is left open.
    pub async fn start(&mut self) -> Result<(), SupervisorError> {
        if let Err(e) = self.link.connect().await {
            error!(error = %e, "Device link failed to start");
            self.transition(SupervisorState::Stopped);
            return Err(SupervisorError::DeviceStart(e));
        }

        if let Err(e) = self.publisher.connect().await {
            error!(error = %e, "Transport failed to start");
            self.link.disconnect().await;
            self.transition(SupervisorState::Stopped);
            return Err(SupervisorError::TransportStart(e));
        }

        self.transition(SupervisorState::Running);
        Ok(())
    }

    /// Collect, encode and publish one snapshot.
    pub async fn run_cycle(&mut self) -> Result<(), CycleError> {
        let snapshot = self.collector.collect(&mut self.link).await;
        let payload = snapshot.to_payload().to_json()?;
        let text = String::from_utf8_lossy(&payload).into_owned();

        self.publisher
            .publish(&self.settings.topic, payload, self.settings.qos)
            .await?;

        info!(
            topic = %self.settings.topic,
            absent = snapshot.absent_count(),
            payload = %text,
            "Published snapshot"
        );
        Ok(())
    }

    /// Run until the shutdown token is cancelled.
    ///
    /// Returns the lifetime cycle counters, or a startup error.
    #[tracing::instrument(name = "supervisor", skip_all, fields(topic = %self.settings.topic))]
    pub async fn run(&mut self) -> Result<CycleStats, SupervisorError> {
        self.start().await?;

        info!(
            interval_secs = self.settings.interval.as_secs_f64(),
            registers = self.collector.map().len(),
            "Polling started"
        );

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            match self.run_cycle().await {
                Ok(()) => self.stats.published += 1,
                Err(e) => {
                    self.stats.failed += 1;
                    warn!(error = %e, "Cycle failed; snapshot dropped");
                }
            }

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
        }

        self.drain().await;
        Ok(self.stats)
    }

    async fn drain(&mut self) {
        self.transition(SupervisorState::Draining);
        self.link.disconnect().await;
        self.publisher.disconnect().await;
        self.transition(SupervisorState::Stopped);

        info!(
            published = self.stats.published,
            failed = self.stats.failed,
            "Polling stopped"
        );
    }
}
