use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const GENERIC_FETCH_ERROR_MESSAGE: &str = "An error occurred.";

/// The single failure kind surfaced to the presentation layer.
///
/// Whatever went wrong underneath (transport, decoding, provider rejection),
/// the UI only ever sees a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct FetchError {
    pub message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Used when the failure carried no error value to describe itself.
    pub fn generic() -> Self {
        Self::new(GENERIC_FETCH_ERROR_MESSAGE)
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<anyhow::Error> for FetchError {
    fn from(value: anyhow::Error) -> Self {
        let message = format!("{value:#}");
        if message.trim().is_empty() {
            Self::generic()
        } else {
            Self::new(message)
        }
    }
}
