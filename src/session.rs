//! Transport-agnostic MCP session engine
//!
//! This module provides [`Session`], the stateful per-connection object that
//! multiplexes JSON-RPC traffic over one [`Transport`]. It owns:
//!
//! - the correlation table mapping request ids to in-flight awaiters,
//! - the progress table routing `notifications/progress` to the awaiter that
//!   registered the token,
//! - the handler registry for server-initiated requests,
//! - the observer registry for other server notifications,
//! - a monotonic id counter (integer ids beginning at 1).
//!
//! # Design
//!
//! A single dispatch task consumes the transport's inbound stream and routes
//! each message by kind: a response wakes the pending request whose id
//! matches; a progress notification is delivered to the matching awaiter's
//! sink; a cancellation notification cancels the matching inbound handler
//! scope; a server request is dispatched to a registered handler in its own
//! task, and the handler's reply is written back through the session.
//! Dispatch never blocks on handler work.
//!
//! Every potentially-unbounded await takes a
//! [`CancellationToken`] context. Cancelling an outbound awaiter removes its
//! correlation entry, best-effort-sends `notifications/cancelled` (send
//! failures are ignored, e.g. when the transport already closed), and
//! completes the awaiter with [`McpError::Cancelled`]. Cancellation is
//! idempotent: an awaiter that already completed ignores it and no second
//! wire-level cancel is emitted.
//!
//! When the transport's inbound stream ends, every pending awaiter completes
//! with [`McpError::TransportClosed`] and all inbound handler scopes are
//! cancelled.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex, Semaphore};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::error::{
    McpError, Result, CODE_INTERNAL_ERROR, CODE_INVALID_PARAMS, CODE_METHOD_NOT_FOUND,
};
use crate::message::{
    JsonRpcError, Message, Notification, ProgressToken, Request, RequestId, Response,
};
use crate::transport::Transport;
use crate::types::{CancelledParams, ProgressParams, NOTIF_CANCELLED, NOTIF_PROGRESS};

/// Convenience alias for a boxed, `Send`-safe async future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Sink receiving progress notifications for one outstanding request.
///
/// Events arrive in wire order; the sink stops receiving once the owning
/// request completes.
pub type ProgressSink = mpsc::UnboundedSender<ProgressParams>;

/// A notification handler: called with the raw `params` value when a
/// matching server notification arrives.
type NotificationHandler = Box<dyn Fn(Option<Value>) + Send + Sync + 'static>;

/// A server-request handler: called with the raw `params` value and a
/// cancellation scope tied to the incoming request id; returns the raw
/// `result` value sent back as the JSON-RPC response.
type RequestHandler = Box<
    dyn Fn(Option<Value>, CancellationToken) -> BoxFuture<'static, Result<Value>>
        + Send
        + Sync
        + 'static,
>;

/// One in-flight outbound request, exclusively owned by the correlation
/// table until it completes, is cancelled, or the transport closes.
struct PendingRequest {
    method: String,
    completion: oneshot::Sender<std::result::Result<Value, JsonRpcError>>,
    progress_token: Option<ProgressToken>,
    issued_at: Instant,
}

/// Session construction knobs.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Upper bound on concurrently running inbound request handlers.
    /// `None` (the default) means unlimited; handlers do their own
    /// admission.
    pub max_concurrent_requests: Option<usize>,
}

/// The stateful per-connection MCP session.
///
/// Create one with [`Session::connect`]; issue requests with
/// [`Session::send_request`] and fire-and-forget notifications with
/// [`Session::notify`].
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use mcpkit::session::Session;
/// use mcpkit::transport::stdio::{StdioOptions, StdioTransport};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let transport = Arc::new(StdioTransport::spawn(StdioOptions::new("mcp-server"))?);
/// let session = Session::connect(transport);
/// let ctx = CancellationToken::new();
/// let _: serde_json::Value = session.send_request("ping", None, &ctx).await?;
/// # Ok(())
/// # }
/// ```
pub struct Session {
    /// Monotonically increasing request id counter, starting at 1.
    next_id: AtomicI64,
    /// In-flight outbound requests waiting for a response.
    pending: Mutex<HashMap<RequestId, PendingRequest>>,
    /// Progress token routing for in-flight requests.
    progress: Mutex<HashMap<ProgressToken, ProgressSink>>,
    /// Registered handlers for server-initiated requests (method -> handler).
    request_handlers: Mutex<HashMap<String, RequestHandler>>,
    /// Registered observers for server notifications (method -> handler).
    notification_handlers: Mutex<HashMap<String, NotificationHandler>>,
    /// Cancellation scopes for inbound requests currently being handled.
    inbound_scopes: Mutex<HashMap<RequestId, CancellationToken>>,
    /// Optional admission control for inbound handlers.
    inbound_limit: Option<Arc<Semaphore>>,
    /// The transport this session multiplexes over.
    transport: Arc<dyn Transport>,
    /// Cancelled once the dispatch loop has exited and pending state is
    /// failed over.
    closed: CancellationToken,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Connect a session over `transport` with default options and start the
    /// dispatch task.
    pub fn connect(transport: Arc<dyn Transport>) -> Arc<Self> {
        Self::connect_with(transport, SessionOptions::default())
    }

    /// Connect a session with explicit [`SessionOptions`].
    pub fn connect_with(transport: Arc<dyn Transport>, options: SessionOptions) -> Arc<Self> {
        let session = Arc::new(Self {
            next_id: AtomicI64::new(1),
            pending: Mutex::new(HashMap::new()),
            progress: Mutex::new(HashMap::new()),
            request_handlers: Mutex::new(HashMap::new()),
            notification_handlers: Mutex::new(HashMap::new()),
            inbound_scopes: Mutex::new(HashMap::new()),
            inbound_limit: options
                .max_concurrent_requests
                .map(|n| Arc::new(Semaphore::new(n.max(1)))),
            transport,
            closed: CancellationToken::new(),
        });
        session.spawn_dispatch();
        session
    }

    /// The transport this session runs over.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// A token cancelled once the session has shut down (transport closed
    /// and pending state failed over).
    pub fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Close the underlying transport. Pending requests complete with
    /// [`McpError::TransportClosed`] once the inbound stream ends.
    ///
    /// # Errors
    ///
    /// Propagates transport shutdown errors.
    pub async fn close(&self) -> Result<()> {
        self.transport.close().await
    }

    /// Send a request and await the typed response.
    ///
    /// Allocates the next monotonic id, parks an awaiter in the correlation
    /// table, writes the framed request, and suspends until the matching
    /// response arrives or `ctx` is cancelled.
    ///
    /// # Errors
    ///
    /// - [`McpError::Cancelled`] when `ctx` fires first; a
    ///   `notifications/cancelled` is sent best-effort.
    /// - [`McpError::TransportClosed`] when the connection ends while
    ///   waiting.
    /// - [`McpError::Rpc`] when the peer returns a JSON-RPC error object.
    /// - [`McpError::NotConnected`] when the transport rejects the write.
    /// - [`McpError::Serialization`] when the result does not deserialize
    ///   into `R`.
    pub async fn send_request<R>(
        &self,
        method: &str,
        params: Option<Value>,
        ctx: &CancellationToken,
    ) -> Result<R>
    where
        R: serde::de::DeserializeOwned,
    {
        let value = self.request_inner(method, params, ctx, None).await?;
        serde_json::from_value(value).map_err(|e| McpError::Serialization(e).into())
    }

    /// Like [`Session::send_request`], additionally registering `progress`
    /// to receive `notifications/progress` for this request.
    ///
    /// The request id doubles as the progress token and is embedded under
    /// `params._meta.progressToken`. The sink receives events only while the
    /// request is pending; notifications arriving after completion are
    /// dropped.
    ///
    /// # Errors
    ///
    /// As [`Session::send_request`]; additionally
    /// [`McpError::InvalidArgument`] when `params` is neither absent nor a
    /// JSON object (there is nowhere to embed the token).
    pub async fn send_request_with_progress<R>(
        &self,
        method: &str,
        params: Option<Value>,
        ctx: &CancellationToken,
        progress: ProgressSink,
    ) -> Result<R>
    where
        R: serde::de::DeserializeOwned,
    {
        let value = self
            .request_inner(method, params, ctx, Some(progress))
            .await?;
        serde_json::from_value(value).map_err(|e| McpError::Serialization(e).into())
    }

    /// Send a notification (no id is allocated and no reply is awaited).
    ///
    /// # Errors
    ///
    /// Propagates transport write errors.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let message = Message::Notification(Notification::new(method, params));
        self.transport.send(&message).await
    }

    /// Register a handler for a server-initiated request method.
    ///
    /// The handler runs in its own task with a cancellation scope keyed by
    /// the incoming id; a peer `notifications/cancelled` cancels the scope
    /// and no response is sent. A handler error becomes a JSON-RPC error
    /// response: [`McpError::Rpc`] passes through its code,
    /// [`McpError::InvalidArgument`] maps to `-32602`, anything else to
    /// `-32603`. Registering a second handler for the same method replaces
    /// the first.
    pub async fn on_request<F>(&self, method: impl Into<String>, handler: F)
    where
        F: Fn(Option<Value>, CancellationToken) -> BoxFuture<'static, Result<Value>>
            + Send
            + Sync
            + 'static,
    {
        self.request_handlers
            .lock()
            .await
            .insert(method.into(), Box::new(handler));
    }

    /// Register an observer for a server notification method.
    ///
    /// `notifications/progress` and `notifications/cancelled` are routed
    /// internally and never reach observers. Unobserved notifications are
    /// dropped silently. Registering a second observer for the same method
    /// replaces the first.
    pub async fn on_notification<F>(&self, method: impl Into<String>, handler: F)
    where
        F: Fn(Option<Value>) + Send + Sync + 'static,
    {
        self.notification_handlers
            .lock()
            .await
            .insert(method.into(), Box::new(handler));
    }

    // -----------------------------------------------------------------------
    // Outbound path
    // -----------------------------------------------------------------------

    async fn request_inner(
        &self,
        method: &str,
        mut params: Option<Value>,
        ctx: &CancellationToken,
        progress: Option<ProgressSink>,
    ) -> Result<Value> {
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst));

        let progress_token = match progress {
            Some(sink) => {
                let token = ProgressToken::from(&id);
                embed_progress_token(&mut params, &token)?;
                self.progress.lock().await.insert(token.clone(), sink);
                Some(token)
            }
            None => None,
        };

        // Park the awaiter before writing so the response can never arrive
        // before the correlation table knows the id.
        let (tx, mut rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(
                id.clone(),
                PendingRequest {
                    method: method.to_string(),
                    completion: tx,
                    progress_token,
                    issued_at: Instant::now(),
                },
            );
        }

        let request = Message::Request(Request::new(id.clone(), method, params));
        if let Err(e) = self.transport.send(&request).await {
            self.discard_pending(&id).await;
            return Err(e);
        }

        tokio::select! {
            biased;

            _ = ctx.cancelled() => {
                if self.discard_pending(&id).await.is_some() {
                    // Still pending: sever the awaiter and tell the peer,
                    // ignoring send failures (the transport may be gone).
                    let cancel = CancelledParams {
                        request_id: id,
                        reason: Some("client cancelled".to_string()),
                    };
                    if let Ok(params) = serde_json::to_value(cancel) {
                        let _ = self.notify(NOTIF_CANCELLED, Some(params)).await;
                    }
                    Err(McpError::Cancelled.into())
                } else {
                    // The response was dispatched concurrently: deliver it
                    // and send no wire-level cancel.
                    match rx.try_recv() {
                        Ok(outcome) => outcome.map_err(|e| McpError::from(e).into()),
                        Err(_) => Err(McpError::Cancelled.into()),
                    }
                }
            }

            outcome = &mut rx => match outcome {
                Ok(result) => result.map_err(|e| McpError::from(e).into()),
                // The completion sender was dropped without firing: the
                // dispatch loop exited.
                Err(_) => Err(McpError::TransportClosed.into()),
            }
        }
    }

    /// Remove a pending entry plus its progress registration, if any.
    async fn discard_pending(&self, id: &RequestId) -> Option<()> {
        let entry = self.pending.lock().await.remove(id)?;
        if let Some(token) = &entry.progress_token {
            self.progress.lock().await.remove(token);
        }
        Some(())
    }

    // -----------------------------------------------------------------------
    // Inbound dispatch
    // -----------------------------------------------------------------------

    fn spawn_dispatch(self: &Arc<Self>) {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            let transport = Arc::clone(&session.transport);
            let mut incoming = transport.incoming();
            while let Some(message) = incoming.next().await {
                match message {
                    Message::Batch(items) => {
                        for item in items {
                            session.dispatch_one(item).await;
                        }
                    }
                    other => session.dispatch_one(other).await,
                }
            }
            drop(incoming);
            session.fail_over().await;
        });
    }

    async fn dispatch_one(self: &Arc<Self>, message: Message) {
        match message {
            Message::Response(response) => self.handle_response(response).await,
            Message::Notification(notification) => {
                self.handle_notification(notification).await
            }
            Message::Request(request) => self.handle_inbound_request(request).await,
            Message::Batch(_) => {
                // The codec rejects nested batches; nothing to do here.
                tracing::warn!("dropping nested batch message");
            }
        }
    }

    /// Resolve the pending awaiter matching this response, if any.
    async fn handle_response(&self, response: Response) {
        let (id, outcome) = response.into_outcome();

        let entry = { self.pending.lock().await.remove(&id) };
        let Some(entry) = entry else {
            tracing::warn!("response for unknown request id {id}; dropping");
            return;
        };

        if let Some(token) = &entry.progress_token {
            self.progress.lock().await.remove(token);
        }

        tracing::debug!(
            method = %entry.method,
            elapsed = ?entry.issued_at.elapsed(),
            "request completed"
        );

        // Ignore send errors: the awaiter may have been cancelled already.
        let _ = entry.completion.send(outcome);
    }

    async fn handle_notification(&self, notification: Notification) {
        match notification.method.as_str() {
            NOTIF_PROGRESS => {
                let params = notification.params.unwrap_or(Value::Null);
                let progress: ProgressParams = match serde_json::from_value(params) {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::warn!("dropping malformed progress notification: {e}");
                        return;
                    }
                };
                // Snapshot the sink and release the lock before sending.
                let sink = {
                    self.progress
                        .lock()
                        .await
                        .get(&progress.progress_token)
                        .cloned()
                };
                match sink {
                    Some(sink) => {
                        let _ = sink.send(progress);
                    }
                    None => {
                        tracing::debug!(
                            "progress for unregistered token {}; dropping",
                            progress.progress_token
                        );
                    }
                }
            }
            NOTIF_CANCELLED => {
                let params = notification.params.unwrap_or(Value::Null);
                let cancelled: CancelledParams = match serde_json::from_value(params) {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::warn!("dropping malformed cancelled notification: {e}");
                        return;
                    }
                };
                let scope = {
                    self.inbound_scopes
                        .lock()
                        .await
                        .remove(&cancelled.request_id)
                };
                match scope {
                    Some(scope) => scope.cancel(),
                    None => {
                        tracing::debug!(
                            "cancellation for unknown inbound request {}; dropping",
                            cancelled.request_id
                        );
                    }
                }
            }
            other => {
                let handlers = self.notification_handlers.lock().await;
                if let Some(handler) = handlers.get(other) {
                    handler(notification.params);
                } else {
                    tracing::debug!("no observer for notification '{other}'; dropping");
                }
            }
        }
    }

    /// Dispatch a server-initiated request to its registered handler.
    async fn handle_inbound_request(self: &Arc<Self>, request: Request) {
        let scope = CancellationToken::new();
        {
            self.inbound_scopes
                .lock()
                .await
                .insert(request.id.clone(), scope.clone());
        }

        let handler_future = {
            let handlers = self.request_handlers.lock().await;
            handlers
                .get(&request.method)
                .map(|h| h(request.params.clone(), scope.clone()))
        };

        let Some(handler_future) = handler_future else {
            self.inbound_scopes.lock().await.remove(&request.id);
            let response = Response::error(
                request.id,
                JsonRpcError {
                    code: CODE_METHOD_NOT_FOUND,
                    message: format!("Method not found: {}", request.method),
                    data: None,
                },
            );
            if let Err(e) = self.transport.send(&Message::Response(response)).await {
                tracing::debug!("failed to send method-not-found response: {e}");
            }
            return;
        };

        let session = Arc::clone(self);
        let id = request.id;
        tokio::spawn(async move {
            let _permit = match &session.inbound_limit {
                Some(semaphore) => Arc::clone(semaphore).acquire_owned().await.ok(),
                None => None,
            };

            tokio::select! {
                biased;

                _ = scope.cancelled() => {
                    // Peer cancelled: a cancelled request must not receive a
                    // response.
                    tracing::debug!("inbound request {id} cancelled by peer");
                }

                outcome = handler_future => {
                    let response = match outcome {
                        Ok(value) => Response::success(id.clone(), value),
                        Err(e) => Response::error(id.clone(), error_to_object(e)),
                    };
                    if let Err(e) = session
                        .transport
                        .send(&Message::Response(response))
                        .await
                    {
                        tracing::debug!("failed to send handler response: {e}");
                    }
                }
            }

            session.inbound_scopes.lock().await.remove(&id);
        });
    }

    /// Fail over all session state after the transport's inbound stream
    /// ends: pending awaiters observe `TransportClosed` (their completion
    /// senders drop unfired), progress routing stops, and every inbound
    /// handler scope is cancelled.
    async fn fail_over(&self) {
        let pending: Vec<PendingRequest> = {
            let mut table = self.pending.lock().await;
            table.drain().map(|(_, entry)| entry).collect()
        };
        if !pending.is_empty() {
            tracing::debug!(
                "transport closed with {} request(s) outstanding",
                pending.len()
            );
        }
        drop(pending);

        self.progress.lock().await.clear();

        let scopes: Vec<CancellationToken> = {
            let mut table = self.inbound_scopes.lock().await;
            table.drain().map(|(_, scope)| scope).collect()
        };
        for scope in scopes {
            scope.cancel();
        }

        self.closed.cancel();
    }
}

/// Embed `token` under `params._meta.progressToken`, creating the object
/// layers as needed.
fn embed_progress_token(params: &mut Option<Value>, token: &ProgressToken) -> Result<()> {
    if params.is_none() {
        *params = Some(Value::Object(serde_json::Map::new()));
    }
    let map = match params {
        Some(Value::Object(map)) => map,
        _ => {
            return Err(McpError::InvalidArgument(
                "params must be a JSON object to carry a progress token".to_string(),
            )
            .into())
        }
    };
    let meta = map
        .entry("_meta")
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    let meta = match meta {
        Value::Object(meta) => meta,
        _ => {
            return Err(McpError::InvalidArgument(
                "params._meta must be a JSON object".to_string(),
            )
            .into())
        }
    };
    meta.insert("progressToken".to_string(), serde_json::to_value(token)?);
    Ok(())
}

/// Convert a handler error into the JSON-RPC error object sent to the peer.
fn error_to_object(error: anyhow::Error) -> JsonRpcError {
    match error.downcast::<McpError>() {
        Ok(McpError::Rpc {
            code,
            message,
            data,
        }) => JsonRpcError {
            code,
            message,
            data,
        },
        Ok(McpError::InvalidArgument(message)) => JsonRpcError {
            code: CODE_INVALID_PARAMS,
            message,
            data: None,
        },
        Ok(other) => JsonRpcError {
            code: CODE_INTERNAL_ERROR,
            message: other.to_string(),
            data: None,
        },
        Err(other) => JsonRpcError {
            code: CODE_INTERNAL_ERROR,
            message: other.to_string(),
            data: None,
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
