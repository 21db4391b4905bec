use serde::{Deserialize, Serialize};

/// Failure of a single fetch against the run API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Network or HTTP-layer failure, including undecodable bodies.
    #[error("transport error: {message}")]
    Transport { message: String },
    #[error("not found: {resource}")]
    NotFound { resource: String },
    /// Bad input to run creation. Never retried.
    #[error("validation failed: {message}")]
    Validation { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    Transport,
    NotFound,
    Validation,
}

impl FetchError {
    pub fn transport(message: impl Into<String>) -> Self {
        FetchError::Transport {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Transport { .. } => FetchErrorKind::Transport,
            FetchError::NotFound { .. } => FetchErrorKind::NotFound,
            FetchError::Validation { .. } => FetchErrorKind::Validation,
        }
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::Validation { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound { .. })
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("request timed out: {err}")
        } else if err.is_decode() {
            format!("failed to parse response: {err}")
        } else {
            err.to_string()
        };
        FetchError::Transport { message }
    }
}
