//! Error types for mcpkit
//!
//! This module defines all error types used throughout the crate, using
//! `thiserror` for ergonomic error handling. Fallible functions return
//! [`Result`], an `anyhow::Result` alias; errors raised by this crate wrap a
//! [`McpError`] so callers can recover the kind with
//! `err.downcast_ref::<McpError>()`.

use thiserror::Error;

/// Main error type for mcpkit operations
///
/// This enum encompasses every failure mode of the protocol core: transport
/// lifecycle errors, framing and envelope errors, peer-reported JSON-RPC
/// errors, cooperative cancellation, and caller-side precondition failures.
#[derive(Error, Debug)]
pub enum McpError {
    /// The peer closed the connection, or the transport was disposed locally.
    ///
    /// Every request still pending at that moment surfaces this uniformly.
    #[error("transport closed")]
    TransportClosed,

    /// A send was attempted before the transport was running or after it
    /// closed. The message carries the underlying cause (e.g. the subprocess
    /// exit status).
    #[error("transport not connected: {0}")]
    NotConnected(String),

    /// A frame could not be parsed as JSON, or a line exceeded the framing
    /// limit. Logged and dropped by the dispatch path; not fatal.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A frame parsed as JSON but is not a valid JSON-RPC 2.0 envelope.
    #[error("invalid JSON-RPC envelope: {0}")]
    InvalidEnvelope(String),

    /// The peer answered a request with a JSON-RPC error object.
    #[error("JSON-RPC error {code}: {message}")]
    Rpc {
        /// Numeric error code as defined by JSON-RPC 2.0 or the MCP spec.
        code: i64,
        /// Human-readable error description.
        message: String,
        /// Optional additional error context.
        data: Option<serde_json::Value>,
    },

    /// The caller cancelled the operation via its cancellation context.
    ///
    /// Distinguished from a peer-sent error: no response was received.
    #[error("request cancelled")]
    Cancelled,

    /// A caller-side precondition failed (empty name, invalid reference).
    ///
    /// Raised before any wire activity.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// JSON serialization/deserialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// JSON-RPC error code for "Method not found".
pub const CODE_METHOD_NOT_FOUND: i64 = -32601;
/// JSON-RPC error code for "Invalid params".
pub const CODE_INVALID_PARAMS: i64 = -32602;
/// JSON-RPC error code for "Internal error".
pub const CODE_INTERNAL_ERROR: i64 = -32603;

/// Result type alias for mcpkit operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

/// Extract the [`McpError`] kind from an `anyhow::Error`, if it wraps one.
///
/// # Examples
///
/// ```
/// use mcpkit::error::{kind_of, McpError};
///
/// let err = anyhow::anyhow!(McpError::Cancelled);
/// assert!(matches!(kind_of(&err), Some(McpError::Cancelled)));
/// ```
pub fn kind_of(err: &anyhow::Error) -> Option<&McpError> {
    err.downcast_ref::<McpError>()
}
