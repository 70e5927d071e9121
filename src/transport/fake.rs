//! In-process fake transport for unit and integration tests
//!
//! This module provides [`FakeTransport`] and [`FakeTransportHandle`], an
//! in-process pair that replaces real process or network I/O in tests.
//!
//! # Channel Wiring
//!
//! From the **client** perspective:
//!
//! - "outbound" = what the client *sends* = what the test reads via
//!   `handle.outbound_rx`.
//! - "inbound"  = what the client *receives* = what the test injects via
//!   `handle.inbound_tx`.
//!
//! ```text
//! client send() -----> outbound_tx -----> outbound_rx (handle reads)
//! handle inbound_tx -> inbound_tx  -----> incoming()  (client receives)
//! ```
//!
//! Dropping the handle's `inbound_tx` ends the client's `incoming()` stream,
//! which is how tests simulate the peer closing the connection.

use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use tokio::sync::{mpsc, Mutex};

use crate::error::{McpError, Result};
use crate::message::Message;
use crate::transport::{channel_stream, StateCell, Transport, TransportState};

/// In-process fake transport for use in tests.
///
/// Implements the full [`Transport`] trait using in-memory channels, so tests
/// can drive a session without spawning processes or binding sockets. Create
/// with [`FakeTransport::new`] to obtain both the transport and the
/// complementary [`FakeTransportHandle`].
#[derive(Debug)]
pub struct FakeTransport {
    /// Sender side for `send()`; the handle drains it via `outbound_rx`.
    outbound_tx: mpsc::UnboundedSender<Message>,
    /// Shared receiver for the inbound channel, exposed via `incoming()`.
    incoming_rx: Arc<Mutex<mpsc::UnboundedReceiver<Message>>>,
    state: Arc<StateCell>,
}

/// The test-side handle for a [`FakeTransport`].
#[derive(Debug)]
pub struct FakeTransportHandle {
    /// Receives messages the client sent via [`Transport::send`].
    pub outbound_rx: mpsc::UnboundedReceiver<Message>,
    /// Sends peer messages into the client's [`Transport::incoming`] stream.
    ///
    /// Drop this to simulate the peer closing the connection.
    pub inbound_tx: mpsc::UnboundedSender<Message>,
}

impl FakeTransport {
    /// Create a new `(FakeTransport, FakeTransportHandle)` pair, already
    /// `Connected`.
    pub fn new() -> (Self, FakeTransportHandle) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, incoming_rx) = mpsc::unbounded_channel();

        let transport = Self {
            outbound_tx,
            incoming_rx: Arc::new(Mutex::new(incoming_rx)),
            state: Arc::new(StateCell::new(TransportState::Connected)),
        };
        let handle = FakeTransportHandle {
            outbound_rx,
            inbound_tx,
        };
        (transport, handle)
    }
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    /// Record the outbound message so the test can read it via
    /// [`FakeTransportHandle::outbound_rx`].
    async fn send(&self, message: &Message) -> Result<()> {
        if self.state.load() != TransportState::Connected {
            return Err(McpError::NotConnected("fake transport closed".to_string()).into());
        }
        self.outbound_tx
            .send(message.clone())
            .map_err(|_| McpError::TransportClosed)?;
        Ok(())
    }

    fn incoming(&self) -> Pin<Box<dyn Stream<Item = Message> + Send + '_>> {
        channel_stream(Arc::clone(&self.incoming_rx))
    }

    fn is_connected(&self) -> bool {
        self.state.load() == TransportState::Connected
    }

    async fn close(&self) -> Result<()> {
        self.state.store(TransportState::Closed);
        self.incoming_rx.lock().await.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::kind_of;
    use crate::message::{Notification, Request, RequestId};
    use std::time::Duration;
    use tokio_stream::StreamExt;

    fn ping_request() -> Message {
        Message::Request(Request::new(RequestId::Number(1), "ping", None))
    }

    /// `send()` delivers the message to `handle.outbound_rx`.
    #[tokio::test]
    async fn test_send_delivers_to_handle() {
        let (transport, mut handle) = FakeTransport::new();

        transport.send(&ping_request()).await.unwrap();

        let received = tokio::time::timeout(Duration::from_secs(2), handle.outbound_rx.recv())
            .await
            .expect("timed out")
            .expect("channel closed");
        assert_eq!(received, ping_request());
    }

    /// `incoming()` yields messages injected via `handle.inbound_tx`, in
    /// order.
    #[tokio::test]
    async fn test_incoming_yields_injected_messages_in_order() {
        let (transport, handle) = FakeTransport::new();

        handle.inbound_tx.send(ping_request()).unwrap();
        handle
            .inbound_tx
            .send(Message::Notification(Notification::new(
                "notifications/progress",
                None,
            )))
            .unwrap();

        let mut stream = transport.incoming();
        let first = stream.next().await.expect("stream ended");
        assert_eq!(first, ping_request());
        let second = stream.next().await.expect("stream ended");
        assert!(matches!(second, Message::Notification(_)));
    }

    /// Dropping the handle's inbound sender ends the incoming stream.
    #[tokio::test]
    async fn test_incoming_ends_when_handle_dropped() {
        let (transport, handle) = FakeTransport::new();
        drop(handle);

        let mut stream = transport.incoming();
        let item = tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .expect("stream did not end");
        assert!(item.is_none());
    }

    /// `send()` after `close()` fails with `NotConnected`.
    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (transport, _handle) = FakeTransport::new();
        transport.close().await.unwrap();
        let err = transport.send(&ping_request()).await.unwrap_err();
        assert!(matches!(kind_of(&err), Some(McpError::NotConnected(_))));
    }

    /// `FakeTransport` satisfies the `Transport` trait object bound.
    #[test]
    fn test_fake_transport_is_object_safe() {
        let (transport, _handle) = FakeTransport::new();
        let _boxed: Box<dyn Transport> = Box::new(transport);
    }
}
