// Error types for the signal pipeline and session engine
//
// None of these are fatal to the process. Capture and detector failures are
// absorbed at the frame-source boundary and show up downstream only as data
// (lower confidence, stale frames).

use thiserror::Error;

/// Result type for pipeline operations
pub type RehabResult<T> = Result<T, RehabError>;

#[derive(Debug, Error)]
pub enum RehabError {
    #[error("Capture permission denied: {0}")]
    PermissionDenied(String),

    #[error("Detection error: {0}")]
    Detection(String),

    #[error("Capture source exhausted")]
    SourceExhausted,

    #[error("Cannot {action} while session is {from}")]
    InvalidTransition { from: String, action: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Channel closed")]
    ChannelClosed,
}

impl RehabError {
    /// Errors that simply degrade the signal rather than stop a loop
    pub fn is_degrading(&self) -> bool {
        matches!(self, Self::PermissionDenied(_) | Self::Detection(_))
    }
}
