//! Error types for thermostt.

use thiserror::Error;

/// Result type used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building or running the controller.
///
/// Only [`Error::Query`] and [`Error::Config`] are fatal; they occur while the
/// controller is being constructed. Everything else is raised per message,
/// logged by the component that hit it, and never stops the control loop.
#[derive(Debug, Error)]
pub enum Error {
    /// The message body is not valid UTF-8.
    #[error("Error decoding payload: {0}")]
    Decode(#[from] std::str::Utf8Error),

    /// A query expression failed to compile.
    #[error("Invalid query {expression:?}: {reason}")]
    Query { expression: String, reason: String },

    /// A compiled query failed against this particular document.
    #[error("Error filtering: {0}")]
    Evaluation(String),

    /// The extracted value does not have the expected type.
    #[error("Error casting {value} to {expected}")]
    Coercion {
        value: String,
        expected: &'static str,
    },

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The transport refused a request.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<rumqttc::ClientError> for Error {
    fn from(err: rumqttc::ClientError) -> Self {
        Error::Transport(err.to_string())
    }
}
