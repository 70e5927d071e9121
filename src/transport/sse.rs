//! Server-Sent-Events server transport
//!
//! This module implements [`SseServerTransport`], which multiplexes outbound
//! JSON-RPC messages onto an HTTP `text/event-stream` response body. It is
//! the server half of the HTTP+SSE transport pairing: the embedding HTTP
//! framework owns the connection and hands this transport the response
//! writer; client→server messages arrive out-of-band (an HTTP POST route)
//! and are injected via [`SseServerTransport::on_message_received`].
//!
//! # Wire format
//!
//! The first event written is always the endpoint advertisement:
//!
//! ```text
//! event: endpoint
//! data: <messageEndpointUrl>
//!
//! ```
//!
//! informing the peer of the URL to POST client→server JSON-RPC messages
//! to. Every subsequent event is `event: message` with `data` set to a
//! single JSON-RPC object, followed by the blank-line separator.
//!
//! # Backpressure
//!
//! Outbound messages pass through a bounded channel (capacity configurable,
//! default 1, single reader, multiple writers); a slow client therefore
//! exerts backpressure on producers blocked in [`Transport::send`].

use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::error::{McpError, Result};
use crate::message::{self, Message};
use crate::transport::{channel_stream, StateCell, Transport, TransportState};

/// Default outbound queue capacity.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 1;

/// SSE server transport writing events onto a framework-provided stream.
///
/// # Examples
///
/// ```no_run
/// use mcpkit::transport::sse::SseServerTransport;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example(response_body: tokio::io::DuplexStream) -> anyhow::Result<()> {
/// let transport = SseServerTransport::new("/message");
/// transport.run(response_body, CancellationToken::new()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SseServerTransport {
    /// URL advertised in the initial `endpoint` event.
    endpoint: String,
    /// Bounded producer side of the outbound queue.
    outbound_tx: mpsc::Sender<Message>,
    /// Consumer side, taken exactly once by `run`.
    outbound_rx: Mutex<Option<mpsc::Receiver<Message>>>,
    /// Producer side for out-of-band inbound messages.
    inbound_tx: mpsc::UnboundedSender<Message>,
    /// Shared receiver exposed via `incoming()`.
    incoming_rx: Arc<Mutex<mpsc::UnboundedReceiver<Message>>>,
    /// Lifecycle state observable through `is_connected`.
    state: Arc<StateCell>,
    /// Cancelled by `close` to stop the write loop.
    closer: CancellationToken,
    /// Cancelled by the write loop on exit; `close` awaits it.
    done: CancellationToken,
}

impl SseServerTransport {
    /// Create a transport advertising `message_endpoint` with the default
    /// outbound capacity of 1.
    pub fn new(message_endpoint: impl Into<String>) -> Self {
        Self::with_capacity(message_endpoint, DEFAULT_OUTBOUND_CAPACITY)
    }

    /// Create a transport with an explicit outbound queue capacity.
    ///
    /// Capacity 1 (the default) means each `send` waits until the previous
    /// event has been handed to the write loop.
    pub fn with_capacity(message_endpoint: impl Into<String>, capacity: usize) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity.max(1));
        let (inbound_tx, incoming_rx) = mpsc::unbounded_channel();
        Self {
            endpoint: message_endpoint.into(),
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            inbound_tx,
            incoming_rx: Arc::new(Mutex::new(incoming_rx)),
            state: Arc::new(StateCell::new(TransportState::Unstarted)),
            closer: CancellationToken::new(),
            done: CancellationToken::new(),
        }
    }

    /// The URL advertised in the initial `endpoint` event.
    pub fn message_endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Drive the outbound write loop on `writer` until the transport is
    /// disposed or `ctx` is cancelled.
    ///
    /// The first bytes written are the `endpoint` event; each queued message
    /// is then written as an `event: message` block and flushed. On
    /// `close()` the loop drains messages already queued before returning.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::NotConnected`] when called twice or after
    /// dispose, and any write error from the underlying stream.
    pub async fn run<W>(&self, mut writer: W, ctx: CancellationToken) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let mut rx = {
            let mut slot = self.outbound_rx.lock().await;
            if self.state.load() != TransportState::Unstarted {
                return Err(McpError::NotConnected(
                    "SSE write loop already started or disposed".to_string(),
                )
                .into());
            }
            match slot.take() {
                Some(rx) => rx,
                None => {
                    return Err(McpError::NotConnected(
                        "SSE write loop already started".to_string(),
                    )
                    .into())
                }
            }
        };

        self.state.store(TransportState::Connected);

        let result = async {
            let endpoint_event = format!("event: endpoint\ndata: {}\n\n", self.endpoint);
            writer.write_all(endpoint_event.as_bytes()).await?;
            writer.flush().await?;

            loop {
                tokio::select! {
                    biased;

                    _ = self.closer.cancelled() => {
                        // Dispose: drain what producers already queued.
                        while let Ok(msg) = rx.try_recv() {
                            write_message_event(&mut writer, &msg).await?;
                        }
                        return Ok(());
                    }

                    _ = ctx.cancelled() => return Ok(()),

                    maybe = rx.recv() => match maybe {
                        Some(msg) => write_message_event(&mut writer, &msg).await?,
                        None => return Ok(()),
                    },
                }
            }
        }
        .await;

        self.state.store(TransportState::Closed);
        // End the inbound stream so a consumer blocked on `incoming()`
        // observes end-of-stream once the transport is closed.
        self.incoming_rx.lock().await.close();
        self.done.cancel();
        result
    }

    /// Inject one client→server message received out-of-band (e.g. by the
    /// framework's POST handler). The message appears on `incoming()`.
    pub fn on_message_received(&self, message: Message) {
        if self.inbound_tx.send(message).is_err() {
            tracing::debug!(
                target: "mcpkit::transport::sse",
                "inbound message dropped: incoming stream consumer gone"
            );
        }
    }
}

/// Write one `event: message` block and flush.
async fn write_message_event<W>(writer: &mut W, message: &Message) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let json = message::encode(message)?;
    let event = format!("event: message\ndata: {}\n\n", json);
    writer.write_all(event.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[async_trait::async_trait]
impl Transport for SseServerTransport {
    /// Enqueue one outbound message for the write loop.
    ///
    /// Blocks while the bounded queue is full, giving backpressure against a
    /// slow client.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::NotConnected`] before `run` or after close, and
    /// [`McpError::TransportClosed`] if the write loop stopped mid-send.
    async fn send(&self, message: &Message) -> Result<()> {
        if self.state.load() != TransportState::Connected {
            return Err(McpError::NotConnected(
                "SSE write loop not running".to_string(),
            )
            .into());
        }
        self.outbound_tx
            .send(message.clone())
            .await
            .map_err(|_| McpError::TransportClosed)?;
        Ok(())
    }

    /// Returns the stream of messages injected via `on_message_received`.
    fn incoming(&self) -> Pin<Box<dyn Stream<Item = Message> + Send + '_>> {
        channel_stream(Arc::clone(&self.incoming_rx))
    }

    fn is_connected(&self) -> bool {
        self.state.load() == TransportState::Connected
    }

    /// Complete the outbound writer and await the write loop. Idempotent.
    async fn close(&self) -> Result<()> {
        match self.state.load() {
            TransportState::Closed => return Ok(()),
            TransportState::Unstarted => {
                // Never ran; nothing to drain.
                self.state.store(TransportState::Closed);
                self.incoming_rx.lock().await.close();
                self.closer.cancel();
                self.done.cancel();
                return Ok(());
            }
            _ => {}
        }
        self.state.store(TransportState::Closing);
        self.closer.cancel();
        self.done.cancelled().await;
        self.state.store(TransportState::Closed);
        Ok(())
    }
}
