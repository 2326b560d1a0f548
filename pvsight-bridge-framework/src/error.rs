//! Error types for the bridge framework.

use thiserror::Error;

/// Result type alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur in a bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration file not found.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration parse error.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration validation error.
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    /// Zenoh connection error.
    #[error("Zenoh connection error: {0}")]
    ZenohConnection(String),

    /// Operation on a transport that has not been connected.
    #[error("Transport is not connected")]
    NotConnected,

    /// `connect` called on a transport that is already connected.
    #[error("Transport is already connected")]
    AlreadyConnected,

    /// Publishing error.
    #[error("Failed to publish to {key}: {message}")]
    Publish { key: String, message: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Create a configuration validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ConfigValidation(msg.into())
    }

    /// Whether this error belongs to the fatal configuration class.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound { .. } | Self::ConfigParse(_) | Self::ConfigValidation(_)
        )
    }
}

impl From<pvsight_common::Error> for BridgeError {
    fn from(err: pvsight_common::Error) -> Self {
        match err {
            pvsight_common::Error::Config(msg) => Self::ConfigValidation(msg),
            pvsight_common::Error::Zenoh(e) => Self::ZenohConnection(e.to_string()),
            pvsight_common::Error::Io(e) => Self::Io(e),
            other => Self::ConfigParse(other.to_string()),
        }
    }
}
