use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Zenoh connection configuration for the telemetry sink.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZenohConfig {
    /// Zenoh mode: "client", "peer", or "router".
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Endpoints to connect to (e.g. `tls/broker.example.com:7447`).
    #[serde(default)]
    pub connect: Vec<String>,

    /// Endpoints to listen on (for peer/router mode).
    #[serde(default)]
    pub listen: Vec<String>,

    /// TLS settings for `tls/` endpoints. Client certificate and key enable mTLS.
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

fn default_mode() -> String {
    "peer".to_string()
}

impl Default for ZenohConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            connect: Vec::new(),
            listen: Vec::new(),
            tls: None,
        }
    }
}

impl ZenohConfig {
    /// Check the mode and, when TLS is configured, that every credential file exists.
    pub fn validate(&self) -> Result<()> {
        match self.mode.as_str() {
            "client" | "peer" | "router" => {}
            other => {
                return Err(Error::Config(format!(
                    "Invalid Zenoh mode: '{}'. Expected 'client', 'peer', or 'router'",
                    other
                )));
            }
        }

        if let Some(tls) = &self.tls {
            tls.validate()?;
        }

        Ok(())
    }
}

/// TLS credential file locations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Root CA used to verify the broker certificate.
    pub root_ca_certificate: PathBuf,

    /// Client certificate (PEM).
    #[serde(default)]
    pub connect_certificate: Option<PathBuf>,

    /// Client private key (PEM).
    #[serde(default)]
    pub connect_private_key: Option<PathBuf>,

    /// Verify the broker hostname against its certificate.
    #[serde(default = "default_verify_name")]
    pub verify_name_on_connect: bool,
}

fn default_verify_name() -> bool {
    true
}

impl TlsConfig {
    /// Whether client certificate authentication is configured.
    pub fn is_mtls(&self) -> bool {
        self.connect_certificate.is_some() && self.connect_private_key.is_some()
    }

    /// Validate that credential files exist and that cert/key come as a pair.
    pub fn validate(&self) -> Result<()> {
        if self.connect_certificate.is_some() != self.connect_private_key.is_some() {
            return Err(Error::Config(
                "TLS connect_certificate and connect_private_key must be set together"
                    .to_string(),
            ));
        }

        let files = std::iter::once(&self.root_ca_certificate)
            .chain(self.connect_certificate.iter())
            .chain(self.connect_private_key.iter());

        for file in files {
            require_file(file)?;
        }

        Ok(())
    }
}

fn require_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Credential file not found: '{}'",
            path.display()
        )))
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

/// Common logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Parse a configuration from a JSON5 string.
pub fn parse_config<T: for<'de> Deserialize<'de>>(content: &str) -> Result<T> {
    json5::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
}
