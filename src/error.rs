use thiserror::Error;

/// Errors raised by the few operations that fail as Rust errors.
///
/// HTTP-level failures are never reported through this type: the gateway
/// turns them into status codes and list operations into [`Diagnostic`]s.
#[derive(Debug, Error)]
pub enum PrismError {
    /// Configuration error (missing env vars, unreadable settings, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A bucket can only be completed while it is in the `New` state.
    #[error("bucket {bucket_id} cannot be completed in state {state}")]
    InvalidBucketState { bucket_id: String, state: String },

    #[error("activity {activity_id} did not reach a terminal state within {waited_secs}s")]
    PollTimeout { activity_id: String, waited_secs: u64 },

    #[error("wait for activity {activity_id} was cancelled")]
    Cancelled { activity_id: String },

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Type alias for Results using PrismError
pub type Result<T> = std::result::Result<T, PrismError>;

/// One failed page request recorded while aggregating a listing.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Diagnostic {
    pub url: String,
    pub status: u16,
    pub message: String,
}
