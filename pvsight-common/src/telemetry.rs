use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;

/// Wire payload published to the telemetry sink once per poll cycle.
///
/// Absent readings are encoded as `null`, never as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPayload {
    /// Unix epoch seconds (fractional) when the cycle started.
    pub timestamp: f64,

    /// Scaled physical measurements.
    pub pv_data: BTreeMap<String, Option<f64>>,

    /// Raw status codes.
    pub system_status: BTreeMap<String, Option<u32>>,
}

impl TelemetryPayload {
    /// Create an empty payload stamped with the given instant.
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp: epoch_seconds(timestamp),
            pv_data: BTreeMap::new(),
            system_status: BTreeMap::new(),
        }
    }

    /// Add a measurement field.
    pub fn with_measurement(mut self, name: impl Into<String>, value: Option<f64>) -> Self {
        self.pv_data.insert(name.into(), value);
        self
    }

    /// Add a status field.
    pub fn with_status(mut self, name: impl Into<String>, value: Option<u32>) -> Self {
        self.system_status.insert(name.into(), value);
        self
    }

    /// Encode as UTF-8 JSON.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode from JSON bytes.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// Convert an instant to fractional Unix epoch seconds.
pub fn epoch_seconds(timestamp: DateTime<Utc>) -> f64 {
    timestamp.timestamp_micros() as f64 / 1_000_000.0
}
