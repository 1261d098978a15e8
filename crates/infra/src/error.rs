use thiserror::Error;

/// Infrastructure failure (storage, encoding, configuration).
///
/// Domain rule violations never surface here; they stay `DomainError`.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("store error: {0}")]
    Store(String),

    /// A write collided with a unique key held by another row.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("record encoding failed: {0}")]
    Serialization(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<serde_json::Error> for InfraError {
    fn from(err: serde_json::Error) -> Self {
        InfraError::Serialization(err.to_string())
    }
}
