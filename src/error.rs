//! Error types for guard configuration and policy management
//!
//! Validation itself never fails: rejections are reported through
//! [`ValidationResult`](crate::types::ValidationResult). These errors only
//! surface while building a policy or loading configuration.

use thiserror::Error;

/// Guard configuration and policy errors
#[derive(Error, Debug)]
pub enum GuardError {
    /// Policy would allow no statement kinds at all
    #[error("Invalid policy: allowed statements must not be empty")]
    EmptyAllowedStatements,

    /// Statement kind name not recognized
    #[error("Unknown statement kind: {0}")]
    UnknownStatementKind(String),

    /// Dialect name or URL not recognized
    #[error("Unsupported database: {0}")]
    UnsupportedDatabase(String),

    /// Configuration value present but malformed
    #[error("Invalid configuration for {key}: {message}")]
    InvalidConfig { key: String, message: String },

    /// JSON decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GuardError {
    pub(crate) fn invalid_config(key: &str, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.to_string(),
            message: message.into(),
        }
    }
}
