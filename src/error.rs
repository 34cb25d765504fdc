//! Crate-wide error type for the UART bridge.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors surfaced by bridge operations.
///
/// The first four variants are the wire-visible response taxonomy: their
/// `Display` output is exactly the message string written into an error
/// response. `Config`, `Io`, and `Json` belong to startup and transport
/// plumbing and never appear in an action response.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The request named no device, or named it with an empty string.
    #[error("name is null!!")]
    InvalidArgument,

    /// The operation targeted a name with no open handle.
    #[error("not open!!")]
    NotOpen,

    /// Unregister targeted a name with no registered callback.
    #[error("not registered!!")]
    NotRegistered,

    /// The peripheral driver reported a failure. Message passed through
    /// verbatim.
    #[error("{0}")]
    Device(String),

    /// Configuration loading or validation failed.
    #[error("config error: {0}")]
    Config(String),

    /// Transport-level I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Wire serialization failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
