//! One full read cycle over the register map.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use pvsight_common::TelemetryPayload;

use crate::device::DeviceLink;
use crate::register_map::{FieldGroup, FieldValue, RegisterMap};

/// One field of a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub name: String,
    pub group: FieldGroup,
    /// `None` when the read failed.
    pub value: Option<FieldValue>,
}

/// Timestamped set of decoded measurements from a single poll cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    timestamp: DateTime<Utc>,
    readings: Vec<Reading>,
}

impl Snapshot {
    /// Instant the cycle started.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Readings in register map order.
    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    /// Look up a reading by field name.
    pub fn get(&self, name: &str) -> Option<&Reading> {
        self.readings.iter().find(|r| r.name == name)
    }

    /// Number of fields whose read failed.
    pub fn absent_count(&self) -> usize {
        self.readings.iter().filter(|r| r.value.is_none()).count()
    }

    /// Build the wire payload.
    pub fn to_payload(&self) -> TelemetryPayload {
        self.readings
            .iter()
            .fold(TelemetryPayload::new(self.timestamp), |payload, reading| {
                match reading.group {
                    FieldGroup::PvData => payload
                        .with_measurement(&reading.name, reading.value.map(|v| v.as_f64())),
                    FieldGroup::SystemStatus => payload.with_status(
                        &reading.name,
                        reading.value.and_then(|v| v.as_status()),
                    ),
                }
            })
    }
}

/// Reads every register in the map through a device link.
#[derive(Debug, Clone)]
pub struct SnapshotCollector {
    map: RegisterMap,
}

impl SnapshotCollector {
    pub fn new(map: RegisterMap) -> Self {
        Self { map }
    }

    pub fn map(&self) -> &RegisterMap {
        &self.map
    }

    /// Run one read cycle.
    ///
    /// A failed read yields an absent field and the cycle continues, so the
    /// snapshot always holds exactly one reading per register.
    pub async fn collect<L>(&self, link: &mut L) -> Snapshot
    where
        L: DeviceLink + ?Sized,
    {
        let timestamp = Utc::now();
        let mut readings = Vec::with_capacity(self.map.len());

        for spec in self.map.iter() {
            let raw = match link
                .read_registers(spec.bank(), spec.protocol_address(), spec.count())
                .await
            {
                Ok(words) => Some(words),
                Err(e) => {
                    warn!(
                        field = spec.name(),
                        address = spec.address(),
                        error = %e,
                        "Register read failed"
                    );
                    None
                }
            };

            readings.push(Reading {
                name: spec.name().to_string(),
                group: spec.group(),
                value: spec.decode(raw.as_deref()),
            });
        }

        let snapshot = Snapshot {
            timestamp,
            readings,
        };
        debug!(
            fields = snapshot.readings.len(),
            absent = snapshot.absent_count(),
            "Collected snapshot"
        );
        snapshot
    }
}
