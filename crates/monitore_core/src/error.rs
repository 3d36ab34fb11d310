use thiserror::Error;

/// Failure taxonomy for every core operation. Boundary layers (HTTP, CLI)
/// map these onto their own surfaces; the core never panics on bad input.
#[derive(Debug, Error)]
pub enum CoreError {
    /// User input failed a schema constraint. Never persisted.
    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },

    /// Principal lacks permission for the requested operation. Deliberately
    /// carries no detail about the target resource.
    #[error("access denied")]
    AccessDenied,

    /// Referenced occurrence has no matching row (or is not visible to the
    /// caller, which must be indistinguishable from absence).
    #[error("not found")]
    NotFound,

    /// Storage failure. Retryable by the caller, never retried by the core.
    #[error("storage failure: {0}")]
    Store(String),

    /// Admin bootstrap failed. No partial state is treated as success.
    #[error("bootstrap failed: {0}")]
    Bootstrap(String),
}

impl CoreError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        CoreError::Validation {
            field,
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => CoreError::NotFound,
            other => CoreError::Store(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Store(format!("stored JSON is corrupt: {err}"))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
