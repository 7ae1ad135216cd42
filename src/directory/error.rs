/// Errors produced while resolving agents or mutating the directory.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    /// The caller supplied an empty or whitespace-only URL.
    #[error("agent URL is empty")]
    InvalidInput,
    /// Discovery, fetch or parse of an agent card failed.
    #[error("{message}")]
    ResolutionFailed { url: String, message: String },
    /// The requested active agent is not registered in the directory.
    #[error("agent {url} is not registered in the directory")]
    DirectoryInvariantViolation { url: String },
}

impl DirectoryError {
    pub(crate) fn resolution(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ResolutionFailed {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Returns true for the empty-input case, which callers treat as a no-op.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput)
    }
}

/// Errors raised by a `Fetch` implementation.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("invalid header name: {0}")]
    InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
    #[error("invalid header value: {0}")]
    InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
    #[error("{0}")]
    Other(String),
}
