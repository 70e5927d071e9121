//! MCP transport abstraction and implementations
//!
//! This module defines the [`Transport`] trait that all MCP transport
//! implementations must satisfy. Concrete implementations live in
//! submodules:
//!
//! - [`stdio::StdioTransport`] -- spawns a child process and communicates
//!   over its stdin/stdout pipes (newline-delimited JSON).
//! - [`sse::SseServerTransport`] -- multiplexes outbound messages onto a
//!   Server-Sent-Events response stream; inbound messages are delivered
//!   out-of-band by the embedding HTTP framework.
//! - [`fake::FakeTransport`] -- in-process fake used in tests (cfg(test)
//!   only).
//!
//! # Design
//!
//! The [`Transport`] trait is intentionally minimal: callers `send` one
//! [`Message`] at a time and consume a single stream of inbound [`Message`]s.
//! Framing, lifecycle supervision, and resource cleanup are the
//! responsibility of each concrete implementation; undecodable frames are
//! logged and dropped inside the transport so the session only ever sees
//! well-formed envelopes.
//!
//! # Lifecycle
//!
//! Every transport moves through `Unstarted → Connected → Closing → Closed`.
//! [`Transport::is_connected`] observes this state and mutates only at those
//! transitions. Sending while not `Connected` fails fast with
//! [`crate::error::McpError::NotConnected`]; the inbound stream ends to
//! signal end-of-stream once the transport is `Closed`.

use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use futures::Stream;
use tokio::sync::{mpsc, Mutex};

use crate::error::Result;
use crate::message::Message;

/// Lifecycle state of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Constructed, not yet running.
    Unstarted,
    /// Running; sends are accepted.
    Connected,
    /// Dispose initiated; draining.
    Closing,
    /// Fully shut down; the inbound stream has ended or will end.
    Closed,
}

/// Lock-free cell holding a [`TransportState`], shared across tasks.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(state: TransportState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> TransportState {
        match self.0.load(Ordering::SeqCst) {
            0 => TransportState::Unstarted,
            1 => TransportState::Connected,
            2 => TransportState::Closing,
            _ => TransportState::Closed,
        }
    }

    pub(crate) fn store(&self, state: TransportState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

/// Abstraction over MCP transport implementations.
///
/// All methods are `async` or return pinned [`Stream`]s so that transport
/// implementations can drive I/O without blocking the Tokio executor. The
/// trait is used polymorphically through `Arc<dyn Transport>`.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Send one outbound message to the remote peer.
    ///
    /// The transport applies whatever framing the underlying medium requires
    /// (a newline for stdio, an SSE event for the SSE stream). Write order
    /// matches call order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::McpError::NotConnected`] if the transport is
    /// not running or has closed; the message carries the underlying cause.
    async fn send(&self, message: &Message) -> Result<()>;

    /// Returns the single-consumer stream of inbound messages.
    ///
    /// Each item is one decoded JSON-RPC message in wire-arrival order. The
    /// stream ends when the transport closes, signalling end-of-stream to the
    /// session.
    fn incoming(&self) -> Pin<Box<dyn Stream<Item = Message> + Send + '_>>;

    /// Whether the transport is currently `Connected`.
    fn is_connected(&self) -> bool;

    /// Initiate shutdown: drain the outbound path and release resources.
    ///
    /// Idempotent; calling `close` on an already-closed transport is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error only when resource release itself fails.
    async fn close(&self) -> Result<()>;
}

/// Adapt a shared inbound channel receiver into a `Stream`.
///
/// Shared by the concrete transports; the receiver is single-consumer but the
/// lock lets `incoming()` be called through `&self`.
pub(crate) fn channel_stream(
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Message>>>,
) -> Pin<Box<dyn Stream<Item = Message> + Send>> {
    Box::pin(futures::stream::unfold(rx, |rx| async move {
        let mut guard = rx.lock().await;
        let item = guard.recv().await?;
        drop(guard);
        Some((item, rx))
    }))
}

pub mod sse;
pub mod stdio;

#[cfg(test)]
pub mod fake;
