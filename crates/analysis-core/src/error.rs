use thiserror::Error;

/// Failures raised by an injected data provider. The engine surfaces these
/// unchanged; retry policy belongs to the caller.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("data processing error: {0}")]
    DataProcessing(String),

    #[error("provider error: {0}")]
    Unknown(String),
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("data integrity violation: {0}")]
    DataIntegrity(String),

    #[error("index {index} out of range for series of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),

    #[error("analysis cancelled")]
    Cancelled,
}
