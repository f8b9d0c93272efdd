//! Error types for the dual-path messenger

use thiserror::Error;

/// Result type for messenger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Messenger errors
///
/// Transport variants never cross the [`Messenger`](crate::Messenger) send
/// boundary: they are logged, recorded as a health sample and reported to
/// the caller as `false`.
#[derive(Error, Debug)]
pub enum Error {
    /// Primary bus reports it is not ready
    #[error("Primary transport not ready")]
    NotReady,

    /// Fallback delivery requested without a destination
    #[error("Fallback delivery requires a destination")]
    MissingDestination,

    /// Fallback delivery requested for an unknown logical name
    #[error("No endpoint registered for {0}")]
    UnregisteredDestination(String),

    /// Request exceeded its timeout
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    /// Network-level failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// Peer answered with a non-200 status
    #[error("Peer rejected message with status {0}")]
    Rejected(u16),

    /// Bus publish failed
    #[error("Publish error: {0}")]
    Publish(String),

    /// Bus subscription failed
    #[error("Subscribe error: {0}")]
    Subscribe(String),

    /// Inbound message handler reported a failure
    #[error("Message handler failed: {0}")]
    Handler(String),

    /// Transport resources were released by `stop()`
    #[error("Transport closed")]
    Closed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// HTTP client construction error
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error is a configuration mistake rather than a transient fault
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Error::MissingDestination | Error::UnregisteredDestination(_) | Error::Config(_)
        )
    }
}
