//! Error types for runbridge-api

use thiserror::Error;

/// API error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Duration string could not be parsed
    #[error("invalid duration {input:?}: {reason}")]
    InvalidDuration {
        /// Offending input
        input: String,
        /// What was wrong with it
        reason: String,
    },

    /// Embedded payload did not deserialize into a build spec
    #[error("{0}")]
    Deserialize(String),

    /// Build spec deserialized but is structurally invalid
    #[error("{field}: {message}")]
    InvalidBuildSpec {
        /// Field path inside the build spec
        field: String,
        /// Detailed message
        message: String,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
