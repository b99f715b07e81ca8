//! Error types for engines.

use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised while building, stepping or rendering an engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Scenario cannot be simulated
    #[error("Invalid scenario: {0}")]
    InvalidScenario(String),

    /// Background map could not be loaded or a frame could not be encoded
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Engine used after `end()`
    #[error("Engine already ended")]
    Ended,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
