//! Error types for the navigation engine.

use thiserror::Error;

/// Failures reported by a [`Transport`](crate::Transport) while a visit is in flight.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Request aborted")]
    Aborted,

    #[error("Transport error: {0}")]
    Other(String),
}

/// Main error type for navigation operations.
#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Corrupted history entry: {0}")]
    Corruption(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Invalid history format: {0}")]
    InvalidFormat(String),

    #[error("History entry expired (epoch {entry}, current {current})")]
    ExpiredEntry { entry: u64, current: u64 },

    #[error("History write rejected: {0}")]
    HistoryRejected(String),

    #[error("Render failed: {0}")]
    Render(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl From<serde_json::Error> for NavigationError {
    fn from(e: serde_json::Error) -> Self {
        NavigationError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for NavigationError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        NavigationError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for NavigationError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        NavigationError::Deserialization(e.to_string())
    }
}

impl From<base64::DecodeError> for NavigationError {
    fn from(e: base64::DecodeError) -> Self {
        NavigationError::Corruption(e.to_string())
    }
}

/// Result type for navigation operations.
pub type Result<T> = std::result::Result<T, NavigationError>;
