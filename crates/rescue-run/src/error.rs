//! Error types for runs.

use thiserror::Error;

/// Result type for run operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while controlling a run.
#[derive(Debug, Error)]
pub enum Error {
    /// A control request arrived with no run to control
    #[error("No active simulation")]
    NoActiveRun,

    /// The engine could not be built from the scenario
    #[error("Engine initialization failed: {0}")]
    EngineInit(String),

    /// Stepping or rendering failed mid-run
    #[error("Step failed: {0}")]
    Step(String),

    /// A render artifact did not show up in time
    #[error("Render artifact for step {step} not available in time")]
    ArtifactTimeout { step: u64 },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
