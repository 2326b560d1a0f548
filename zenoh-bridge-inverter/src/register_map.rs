//! Inverter register layout.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use pvsight_bridge_framework::BridgeError;

use crate::decode;

/// Register map construction errors. All of them are fatal at startup.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegisterMapError {
    #[error("Register map is empty")]
    Empty,
    #[error("Register name cannot be empty")]
    EmptyName,
    #[error("Register '{name}': count must be 1 or 2, got {count}")]
    InvalidCount { name: String, count: u16 },
    #[error("Register '{name}': address must be 1-based, got 0")]
    InvalidAddress { name: String },
    #[error("Register '{name}': scale must be finite, got {scale}")]
    InvalidScale { name: String, scale: f64 },
    #[error("Register '{name}': system_status fields are unscaled, got scale {scale}")]
    ScaledStatus { name: String, scale: f64 },
    #[error("Duplicate register name '{0}'")]
    DuplicateName(String),
}

impl From<RegisterMapError> for BridgeError {
    fn from(err: RegisterMapError) -> Self {
        BridgeError::validation(err.to_string())
    }
}

/// Payload section a register is published under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldGroup {
    /// Scaled physical measurement.
    #[default]
    PvData,
    /// Raw integer status code.
    SystemStatus,
}

/// Modbus register bank.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterBank {
    /// Holding registers, function code 3.
    #[default]
    Holding,
    /// Input registers, function code 4.
    Input,
}

impl RegisterBank {
    /// Modbus function code used to read this bank.
    pub fn function_code(&self) -> u8 {
        match self {
            RegisterBank::Holding => 3,
            RegisterBank::Input => 4,
        }
    }

    /// Return the string name for this bank.
    pub fn as_str(&self) -> &'static str {
        match self {
            RegisterBank::Holding => "holding",
            RegisterBank::Input => "input",
        }
    }
}

/// A decoded field value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    /// Scaled measurement in physical units.
    Measurement(f64),
    /// Raw status code.
    Status(u32),
}

impl FieldValue {
    /// Numeric value as a float.
    pub fn as_f64(&self) -> f64 {
        match *self {
            FieldValue::Measurement(v) => v,
            FieldValue::Status(code) => f64::from(code),
        }
    }

    /// Status code, if this is a status value.
    pub fn as_status(&self) -> Option<u32> {
        match *self {
            FieldValue::Status(code) => Some(code),
            FieldValue::Measurement(_) => None,
        }
    }
}

/// One logical measurement in the device's register layout.
///
/// Addresses follow the device documentation (1-based, e.g. 40001); the
/// protocol address is one less.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterSpec {
    name: String,
    address: u16,
    count: u16,
    scale: f64,
    group: FieldGroup,
    bank: RegisterBank,
}

impl RegisterSpec {
    /// Create a validated holding-register measurement.
    pub fn new(
        name: impl Into<String>,
        address: u16,
        count: u16,
        scale: f64,
    ) -> Result<Self, RegisterMapError> {
        Self::with_layout(
            name,
            address,
            count,
            scale,
            FieldGroup::PvData,
            RegisterBank::Holding,
        )
    }

    /// Create a validated register with explicit group and bank.
    pub fn with_layout(
        name: impl Into<String>,
        address: u16,
        count: u16,
        scale: f64,
        group: FieldGroup,
        bank: RegisterBank,
    ) -> Result<Self, RegisterMapError> {
        let name = name.into();

        if name.is_empty() {
            return Err(RegisterMapError::EmptyName);
        }
        if !(1..=2).contains(&count) {
            return Err(RegisterMapError::InvalidCount { name, count });
        }
        if address == 0 {
            return Err(RegisterMapError::InvalidAddress { name });
        }
        if !scale.is_finite() {
            return Err(RegisterMapError::InvalidScale { name, scale });
        }
        if group == FieldGroup::SystemStatus && scale != 1.0 {
            return Err(RegisterMapError::ScaledStatus { name, scale });
        }

        Ok(Self {
            name,
            address,
            count,
            scale,
            group,
            bank,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 1-based register number as documented by the device.
    pub fn address(&self) -> u16 {
        self.address
    }

    /// 0-based address sent on the wire.
    pub fn protocol_address(&self) -> u16 {
        self.address - 1
    }

    pub fn count(&self) -> u16 {
        self.count
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn group(&self) -> FieldGroup {
        self.group
    }

    pub fn bank(&self) -> RegisterBank {
        self.bank
    }

    /// Decode a raw reading for this register.
    ///
    /// A reading whose length does not match `count` is treated as absent.
    pub fn decode(&self, raw: Option<&[u16]>) -> Option<FieldValue> {
        let raw = raw.filter(|words| words.len() == usize::from(self.count));

        match self.group {
            FieldGroup::PvData => decode::decode(raw, self.scale).map(FieldValue::Measurement),
            FieldGroup::SystemStatus => raw.and_then(decode::compose).map(FieldValue::Status),
        }
    }
}

/// Built-in layout of the Hitachi Hiverter inverter family.
const DEFAULT_LAYOUT: &[(&str, u16, u16, f64, FieldGroup)] = &[
    ("dc_voltage", 40001, 1, 0.1, FieldGroup::PvData),
    ("dc_current", 40002, 1, 0.01, FieldGroup::PvData),
    ("dc_power", 40003, 2, 1.0, FieldGroup::PvData),
    ("ac_voltage", 40010, 1, 0.1, FieldGroup::PvData),
    ("ac_current", 40011, 1, 0.01, FieldGroup::PvData),
    ("ac_power", 40012, 2, 1.0, FieldGroup::PvData),
    ("frequency", 40015, 1, 0.01, FieldGroup::PvData),
    ("energy_today", 40020, 2, 0.1, FieldGroup::PvData),
    ("energy_total", 40022, 2, 0.1, FieldGroup::PvData),
    ("temperature", 40030, 1, 0.1, FieldGroup::PvData),
    ("status", 40040, 1, 1.0, FieldGroup::PvData),
    ("operating_state", 40100, 1, 1.0, FieldGroup::SystemStatus),
    ("fault_code", 40101, 1, 1.0, FieldGroup::SystemStatus),
    ("warning_code", 40102, 1, 1.0, FieldGroup::SystemStatus),
];

/// Ordered, validated set of registers polled each cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterMap {
    specs: Vec<RegisterSpec>,
}

impl RegisterMap {
    /// Build a map, rejecting an empty list or duplicate names.
    pub fn new(specs: Vec<RegisterSpec>) -> Result<Self, RegisterMapError> {
        if specs.is_empty() {
            return Err(RegisterMapError::Empty);
        }

        let mut seen = HashSet::with_capacity(specs.len());
        for spec in &specs {
            if !seen.insert(spec.name()) {
                return Err(RegisterMapError::DuplicateName(spec.name().to_string()));
            }
        }

        Ok(Self { specs })
    }

    /// The built-in inverter layout, validated like any configured map.
    pub fn default_layout() -> Result<Self, RegisterMapError> {
        let specs = DEFAULT_LAYOUT
            .iter()
            .map(|&(name, address, count, scale, group)| {
                RegisterSpec::with_layout(name, address, count, scale, group, RegisterBank::Holding)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(specs)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisterSpec> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Look up a register by name.
    pub fn get(&self, name: &str) -> Option<&RegisterSpec> {
        self.specs.iter().find(|spec| spec.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_is_valid() {
        let layout = RegisterMap::default_layout().unwrap();

        assert_eq!(layout.len(), 14);
        assert_eq!(layout.get("dc_voltage").unwrap().address(), 40001);
        assert_eq!(layout.get("ac_power").unwrap().count(), 2);
        assert_eq!(
            layout.get("fault_code").unwrap().group(),
            FieldGroup::SystemStatus
        );
        assert!(layout.iter().all(|s| s.bank() == RegisterBank::Holding));
    }

    #[test]
    fn test_default_layout_status_fields_are_unscaled() {
        let layout = RegisterMap::default_layout().unwrap();
        for spec in layout.iter().filter(|s| s.group() == FieldGroup::SystemStatus) {
            assert_eq!(spec.scale(), 1.0, "{}", spec.name());
        }
    }

    #[test]
    fn test_protocol_address_is_zero_based() {
        let spec = RegisterSpec::new("dc_voltage", 40001, 1, 0.1).unwrap();
        assert_eq!(spec.protocol_address(), 40000);

        let first = RegisterSpec::new("first", 1, 1, 1.0).unwrap();
        assert_eq!(first.protocol_address(), 0);
    }

    #[test]
    fn test_invalid_count_rejected() {
        for count in [0, 3, 4, 125] {
            let err = RegisterSpec::new("bad", 40001, count, 1.0).unwrap_err();
            assert_eq!(
                err,
                RegisterMapError::InvalidCount {
                    name: "bad".to_string(),
                    count
                }
            );
        }
    }

    #[test]
    fn test_zero_address_rejected() {
        assert!(matches!(
            RegisterSpec::new("bad", 0, 1, 1.0),
            Err(RegisterMapError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_non_finite_scale_rejected() {
        assert!(matches!(
            RegisterSpec::new("bad", 1, 1, f64::NAN),
            Err(RegisterMapError::InvalidScale { .. })
        ));
    }

    #[test]
    fn test_scaled_status_rejected() {
        let result = RegisterSpec::with_layout(
            "fault_code",
            40101,
            1,
            0.1,
            FieldGroup::SystemStatus,
            RegisterBank::Holding,
        );
        assert!(matches!(result, Err(RegisterMapError::ScaledStatus { .. })));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let specs = vec![
            RegisterSpec::new("dc_voltage", 40001, 1, 0.1).unwrap(),
            RegisterSpec::new("dc_voltage", 40002, 1, 0.1).unwrap(),
        ];
        assert_eq!(
            RegisterMap::new(specs),
            Err(RegisterMapError::DuplicateName("dc_voltage".to_string()))
        );
    }

    #[test]
    fn test_empty_map_rejected() {
        assert_eq!(RegisterMap::new(Vec::new()), Err(RegisterMapError::Empty));
    }

    #[test]
    fn test_decode_measurement_and_status() {
        let voltage = RegisterSpec::new("dc_voltage", 40001, 1, 0.1).unwrap();
        assert_eq!(
            voltage.decode(Some(&[500][..])),
            Some(FieldValue::Measurement(50.0))
        );
        assert_eq!(voltage.decode(None), None);

        let state = RegisterSpec::with_layout(
            "operating_state",
            40100,
            1,
            1.0,
            FieldGroup::SystemStatus,
            RegisterBank::Holding,
        )
        .unwrap();
        assert_eq!(state.decode(Some(&[4][..])), Some(FieldValue::Status(4)));
    }

    #[test]
    fn test_decode_rejects_short_reading() {
        let power = RegisterSpec::new("ac_power", 40012, 2, 1.0).unwrap();
        assert_eq!(power.decode(Some(&[7][..])), None);
        assert_eq!(
            power.decode(Some(&[0, 1500][..])),
            Some(FieldValue::Measurement(1500.0))
        );
    }

    #[test]
    fn test_bank_function_codes() {
        assert_eq!(RegisterBank::Holding.function_code(), 3);
        assert_eq!(RegisterBank::Input.function_code(), 4);
        assert_eq!(RegisterBank::default(), RegisterBank::Holding);
    }

    #[test]
    fn test_map_error_becomes_validation_error() {
        let err: BridgeError = RegisterMapError::Empty.into();
        assert!(err.is_config());
    }
}
