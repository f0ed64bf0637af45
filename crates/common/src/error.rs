// Error types for LocalDomain

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Required input missing or malformed; never sent to the backend
    #[error("Validation error: {0}")]
    Validation(String),

    /// Action requested in a state that does not allow it
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Error object returned by the backend
    #[error("Daemon error: {message}")]
    Rpc { code: i32, message: String },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Message suitable for showing in a form or modal.
    ///
    /// Structured errors yield their inner message; anything else is
    /// rendered through `Display`.
    pub fn user_message(&self) -> String {
        match self {
            Error::Rpc { message, .. } => message.clone(),
            Error::Validation(msg) | Error::InvalidState(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
