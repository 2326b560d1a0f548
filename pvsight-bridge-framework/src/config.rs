//! Configuration traits and utilities.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{BridgeError, Result};
use crate::{LoggingConfig, ZenohConfig};

/// Trait for bridge configuration types.
///
/// Implement this trait for your bridge's configuration struct to get
/// automatic loading, validation, and access to common config fields.
pub trait BridgeConfig: Sized + DeserializeOwned {
    /// Get the Zenoh configuration.
    fn zenoh(&self) -> &ZenohConfig;

    /// Get the logging configuration.
    fn logging(&self) -> &LoggingConfig;

    /// Validate bridge-specific settings.
    ///
    /// Called automatically after loading, after the Zenoh section was checked.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Parse and validate configuration from JSON5 text.
    fn parse(content: &str) -> Result<Self> {
        let config: Self = pvsight_common::parse_config(content)
            .map_err(|e| BridgeError::ConfigParse(e.to_string()))?;

        config.zenoh().validate()?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a file path.
    ///
    /// Supports JSON5 format. Calls [`validate`](Self::validate) after loading.
    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BridgeError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct TestConfig {
        #[serde(default)]
        zenoh: ZenohConfig,
        #[serde(default)]
        logging: LoggingConfig,
        topic: String,
    }

    impl BridgeConfig for TestConfig {
        fn zenoh(&self) -> &ZenohConfig {
            &self.zenoh
        }

        fn logging(&self) -> &LoggingConfig {
            &self.logging
        }

        fn validate(&self) -> Result<()> {
            if self.topic.is_empty() {
                return Err(BridgeError::validation("topic cannot be empty"));
            }
            Ok(())
        }
    }

    #[test]
    fn test_config_not_found() {
        let result = TestConfig::load("/nonexistent/path.json5");
        assert!(matches!(result, Err(BridgeError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_parse_runs_validation() {
        let result = TestConfig::parse(r#"{ topic: "" }"#);
        assert!(matches!(result, Err(BridgeError::ConfigValidation(_))));

        let config = TestConfig::parse(r#"{ topic: "inverter/data" }"#).unwrap();
        assert_eq!(config.topic, "inverter/data");
    }

    #[test]
    fn test_parse_checks_zenoh_section() {
        let result = TestConfig::parse(
            r#"{
                topic: "inverter/data",
                zenoh: { mode: "client", tls: { root_ca_certificate: "/nonexistent/ca.pem" } }
            }"#,
        );
        assert!(matches!(result, Err(BridgeError::ConfigValidation(m)) if m.contains("ca.pem")));
    }

    #[test]
    fn test_malformed_json5() {
        let result = TestConfig::parse("{ topic: ");
        assert!(matches!(result, Err(BridgeError::ConfigParse(_))));
    }
}
