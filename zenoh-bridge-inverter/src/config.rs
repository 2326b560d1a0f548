//! Configuration for the inverter bridge.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use pvsight_bridge_framework::{BridgeConfig, BridgeError, LoggingConfig, Qos, ZenohConfig};

use crate::register_map::{FieldGroup, RegisterBank, RegisterMap, RegisterMapError, RegisterSpec};
use crate::supervisor::SupervisorSettings;

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InverterBridgeConfig {
    /// Zenoh connection settings (telemetry sink)
    pub zenoh: ZenohConfig,

    /// Inverter and polling settings
    pub inverter: InverterConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Inverter device and publishing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InverterConfig {
    /// Device name (used in logs)
    #[serde(default = "default_name")]
    pub name: String,

    /// Connection type and address
    pub connection: ConnectionConfig,

    /// Modbus unit/slave ID (1-247)
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,

    /// Delay between the end of one cycle and the start of the next, in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// I/O timeout for connect and each register read, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Key expression the snapshot is published on
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Delivery guarantee for each publish
    #[serde(default)]
    pub qos: Qos,

    /// Register layout; the built-in inverter layout is used when empty
    #[serde(default)]
    pub registers: Vec<RegisterConfig>,
}

fn default_name() -> String {
    "inverter".to_string()
}

fn default_unit_id() -> u8 {
    1
}

fn default_poll_interval() -> u64 {
    10
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_topic() -> String {
    "inverter/data".to_string()
}

/// Connection configuration (TCP or RTU).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConnectionConfig {
    /// Modbus TCP connection
    Tcp {
        /// Host address (IP or hostname)
        host: String,
        /// TCP port (default: 502)
        #[serde(default = "default_modbus_port")]
        port: u16,
    },
    /// Modbus RTU (serial) connection, e.g. through an RS485 line driver
    Rtu {
        /// Serial port path (e.g., "/dev/serial0" or "COM1")
        port: String,
        /// Baud rate (default: 9600)
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
        /// Data bits (default: 8)
        #[serde(default = "default_data_bits")]
        data_bits: u8,
        /// Parity (default: none)
        #[serde(default)]
        parity: Parity,
        /// Stop bits: 1 or 2 (default: 1)
        #[serde(default = "default_stop_bits")]
        stop_bits: u8,
    },
}

fn default_modbus_port() -> u16 {
    502
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

/// Serial parity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

/// Configuration for one register in the layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterConfig {
    /// Field name in the published payload
    pub name: String,

    /// 1-based register number as documented by the device (e.g. 40001)
    pub address: u16,

    /// Number of registers: 1, or 2 for a big-endian 32-bit value
    #[serde(default = "default_count")]
    pub count: u16,

    /// Scaling factor (value * scale)
    #[serde(default = "default_scale")]
    pub scale: f64,

    /// Payload section
    #[serde(default)]
    pub group: FieldGroup,

    /// Register bank (holding = FC3, input = FC4)
    #[serde(default)]
    pub bank: RegisterBank,
}

fn default_count() -> u16 {
    1
}

fn default_scale() -> f64 {
    1.0
}

impl TryFrom<&RegisterConfig> for RegisterSpec {
    type Error = RegisterMapError;

    fn try_from(config: &RegisterConfig) -> Result<Self, Self::Error> {
        RegisterSpec::with_layout(
            config.name.clone(),
            config.address,
            config.count,
            config.scale,
            config.group,
            config.bank,
        )
    }
}

impl InverterConfig {
    /// Build the validated register map for this device.
    pub fn register_map(&self) -> Result<RegisterMap, RegisterMapError> {
        if self.registers.is_empty() {
            return RegisterMap::default_layout();
        }

        let specs = self
            .registers
            .iter()
            .map(RegisterSpec::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        RegisterMap::new(specs)
    }

    /// I/O timeout for device operations.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Polling supervisor settings derived from this configuration.
    pub fn supervisor_settings(&self) -> SupervisorSettings {
        SupervisorSettings {
            topic: self.topic.clone(),
            qos: self.qos,
            interval: Duration::from_secs(self.poll_interval_secs),
        }
    }
}

impl BridgeConfig for InverterBridgeConfig {
    fn zenoh(&self) -> &ZenohConfig {
        &self.zenoh
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn validate(&self) -> Result<(), BridgeError> {
        let inverter = &self.inverter;

        if inverter.name.is_empty() {
            return Err(BridgeError::validation("Device name cannot be empty"));
        }

        if !(1..=247).contains(&inverter.unit_id) {
            return Err(BridgeError::validation(format!(
                "Device '{}': unit_id must be 1-247",
                inverter.name
            )));
        }

        if inverter.poll_interval_secs == 0 {
            return Err(BridgeError::validation(format!(
                "Device '{}': poll_interval_secs must be positive",
                inverter.name
            )));
        }

        if inverter.timeout_ms == 0 {
            return Err(BridgeError::validation(format!(
                "Device '{}': timeout_ms must be positive",
                inverter.name
            )));
        }

        zenoh::key_expr::KeyExpr::try_from(inverter.topic.as_str()).map_err(|e| {
            BridgeError::validation(format!("Invalid topic '{}': {}", inverter.topic, e))
        })?;

        if let ConnectionConfig::Rtu {
            data_bits,
            stop_bits,
            ..
        } = &inverter.connection
        {
            if !(5..=8).contains(data_bits) {
                return Err(BridgeError::validation(format!(
                    "Device '{}': data_bits must be 5-8",
                    inverter.name
                )));
            }
            if !(1..=2).contains(stop_bits) {
                return Err(BridgeError::validation(format!(
                    "Device '{}': stop_bits must be 1 or 2",
                    inverter.name
                )));
            }
        }

        inverter.register_map()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tcp_config() {
        let json = r#"{
            zenoh: { mode: "peer" },
            inverter: {
                name: "hiverter",
                connection: { type: "tcp", host: "192.168.1.100" },
            }
        }"#;

        let config = InverterBridgeConfig::parse(json).unwrap();
        let inverter = &config.inverter;
        assert_eq!(inverter.name, "hiverter");
        assert_eq!(inverter.unit_id, 1);
        assert_eq!(inverter.poll_interval_secs, 10);
        assert_eq!(inverter.topic, "inverter/data");
        assert_eq!(inverter.qos, Qos::AtLeastOnce);

        if let ConnectionConfig::Tcp { host, port } = &inverter.connection {
            assert_eq!(host, "192.168.1.100");
            assert_eq!(*port, 502); // default
        } else {
            panic!("Expected TCP connection");
        }

        assert_eq!(inverter.register_map().unwrap(), RegisterMap::default_layout().unwrap());
    }

    #[test]
    fn test_parse_rtu_config() {
        let json = r#"{
            zenoh: { mode: "client", connect: ["tcp/127.0.0.1:7447"] },
            inverter: {
                connection: { type: "rtu", port: "/dev/serial0" },
                unit_id: 5,
                topic: "solar_power_data/topic",
                qos: "at_most_once",
            }
        }"#;

        let config = InverterBridgeConfig::parse(json).unwrap();
        let inverter = &config.inverter;

        assert_eq!(inverter.unit_id, 5);
        assert_eq!(inverter.qos, Qos::AtMostOnce);
        assert_eq!(
            inverter.connection,
            ConnectionConfig::Rtu {
                port: "/dev/serial0".to_string(),
                baud_rate: 9600,
                data_bits: 8,
                parity: Parity::None,
                stop_bits: 1,
            }
        );
    }

    #[test]
    fn test_custom_registers() {
        let json = r#"{
            zenoh: {},
            inverter: {
                connection: { type: "tcp", host: "10.0.0.5" },
                registers: [
                    { name: "dc_voltage", address: 40001, scale: 0.1 },
                    { name: "ac_power", address: 40012, count: 2 },
                    { name: "fault_code", address: 30101, group: "system_status", bank: "input" },
                ]
            }
        }"#;

        let config = InverterBridgeConfig::parse(json).unwrap();
        let map = config.inverter.register_map().unwrap();

        assert_eq!(map.len(), 3);
        assert_eq!(map.get("dc_voltage").unwrap().scale(), 0.1);
        assert_eq!(map.get("ac_power").unwrap().count(), 2);
        let fault = map.get("fault_code").unwrap();
        assert_eq!(fault.group(), FieldGroup::SystemStatus);
        assert_eq!(fault.bank(), RegisterBank::Input);
    }

    #[test]
    fn test_invalid_register_count_fails_fast() {
        let json = r#"{
            zenoh: {},
            inverter: {
                connection: { type: "tcp", host: "10.0.0.5" },
                registers: [ { name: "energy", address: 40020, count: 4 } ]
            }
        }"#;

        let err = InverterBridgeConfig::parse(json).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("count must be 1 or 2"));
    }

    #[test]
    fn test_duplicate_register_names_fail_fast() {
        let json = r#"{
            zenoh: {},
            inverter: {
                connection: { type: "tcp", host: "10.0.0.5" },
                registers: [
                    { name: "dc_voltage", address: 40001 },
                    { name: "dc_voltage", address: 40002 },
                ]
            }
        }"#;

        let err = InverterBridgeConfig::parse(json).unwrap_err();
        assert!(err.to_string().contains("Duplicate register name"));
    }

    #[test]
    fn test_validate_unit_id() {
        let json = r#"{
            zenoh: {},
            inverter: { connection: { type: "tcp", host: "10.0.0.5" }, unit_id: 0 }
        }"#;
        assert!(InverterBridgeConfig::parse(json).is_err());
    }

    #[test]
    fn test_validate_topic() {
        let json = r#"{
            zenoh: {},
            inverter: { connection: { type: "tcp", host: "10.0.0.5" }, topic: "inverter//data" }
        }"#;
        let err = InverterBridgeConfig::parse(json).unwrap_err();
        assert!(err.to_string().contains("Invalid topic"));
    }

    #[test]
    fn test_validate_parity_name() {
        let json = r#"{
            zenoh: {},
            inverter: { connection: { type: "rtu", port: "/dev/ttyUSB0", parity: "mark" } }
        }"#;
        assert!(matches!(
            InverterBridgeConfig::parse(json),
            Err(BridgeError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_supervisor_settings() {
        let json = r#"{
            zenoh: {},
            inverter: { connection: { type: "tcp", host: "10.0.0.5" }, poll_interval_secs: 30 }
        }"#;
        let config = InverterBridgeConfig::parse(json).unwrap();
        let settings = config.inverter.supervisor_settings();
        assert_eq!(settings.interval, Duration::from_secs(30));
        assert_eq!(settings.topic, "inverter/data");
        assert_eq!(config.inverter.timeout(), Duration::from_millis(1000));
    }
}
