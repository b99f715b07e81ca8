//! Error types for scenario translation and persistence.

use thiserror::Error;

/// Result type for scenario operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or persisting a scenario.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed scenario request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Scenario file could not be (de)serialized
    #[error("Scenario format error: {0}")]
    Format(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
