//! Error types for the server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving requests.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed request
    #[error("{0}")]
    InvalidInput(String),

    /// Requested resource does not exist
    #[error("{0}")]
    NotFound(String),

    /// Scenario translation or persistence error
    #[error(transparent)]
    Scenario(#[from] rescue_scenario::Error),

    /// Run control error
    #[error(transparent)]
    Run(#[from] rescue_run::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::InvalidInput(_)
            | Error::Scenario(rescue_scenario::Error::InvalidInput(_))
            | Error::Run(rescue_run::Error::NoActiveRun) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{self}");
        }
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}
