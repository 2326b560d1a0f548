//! Zenoh bridge for PV inverter telemetry.
//!
//! This bridge polls an inverter over Modbus (TCP or RTU/serial), decodes
//! its register layout into physical measurements, and publishes one JSON
//! snapshot per poll cycle to a Zenoh key expression.
//!
//! # Payload
//!
//! ```text
//! {
//!   "timestamp": 1718000000.25,
//!   "pv_data": { "dc_voltage": 50.0, "ac_power": null, ... },
//!   "system_status": { "operating_state": 2, "fault_code": 0, ... }
//! }
//! ```
//!
//! Fields whose read failed are published as `null`.

pub mod collector;
pub mod config;
pub mod decode;
pub mod device;
pub mod register_map;
pub mod supervisor;

pub use collector::{Reading, Snapshot, SnapshotCollector};
pub use config::InverterBridgeConfig;
pub use device::{DeviceLink, DeviceLinkError, ModbusDeviceLink};
pub use register_map::{FieldGroup, FieldValue, RegisterBank, RegisterMap, RegisterSpec};
pub use supervisor::{CycleStats, PollingSupervisor, SupervisorSettings, SupervisorState};
