use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad request shape. Surfaced to the caller, never retried.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// A single failed call to an external provider or index.
    #[error("Upstream call failed: {0}")]
    Upstream(String),

    /// A provider call that exhausted its retry budget.
    #[error("{operation} failed after {attempts} attempts: {reason}")]
    Provider { operation: String, attempts: u32, reason: String },

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Index failure: {0}")]
    Index(String),

    /// Model output that could not be read as the expected JSON.
    #[error("Failed to parse model response: {0}")]
    Parse(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Whether another attempt at the same call could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Error::Cancelled | Error::Validation(_) | Error::NotConfigured(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
