//! Error types for the debate system.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DebateError {
    #[error("Invalid lineup: {0}")]
    InvalidLineup(String),

    #[error("Invalid motion: {field} must not be empty")]
    InvalidMotion { field: &'static str },

    #[error("A debate is already running")]
    AlreadyRunning,

    #[error("Turn source error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown debate format: {0}")]
    UnknownFormat(String),

    #[error("Debate worker failed: {0}")]
    WorkerFailed(String),
}

/// Failure of a single language-model call.
///
/// A well-formed but empty response is `Ok(String::new())`, never one of these.
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("API request failed: {0}")]
    Api(#[from] async_openai::error::OpenAIError),

    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    #[error("Stream interrupted: {0}")]
    Stream(String),

    #[error("{0}")]
    Other(String),
}
