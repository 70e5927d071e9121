//! Session integration tests
//!
//! Exercises the session's correlation, cancellation, progress, and
//! inbound-dispatch behavior end-to-end through a real transport: a
//! [`SseServerTransport`] running over an in-memory duplex stream. The
//! peer side of each test reads framed events off the stream (so outbound
//! traffic is observed exactly as it hits the wire) and injects inbound
//! messages through the transport's out-of-band delivery path.
//!
//! Transport-level framing assertions live in `tests/sse_transport_test.rs`;
//! these tests focus on the session semantics riding on top.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, DuplexStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use mcpkit::error::{kind_of, McpError};
use mcpkit::message::decode;
use mcpkit::session::Session;
use mcpkit::transport::sse::SseServerTransport;
use mcpkit::transport::Transport;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Reads SSE event blocks off the peer end of the stream and returns the
/// `data` payload of each `event: message` block as parsed JSON.
struct WireReader {
    stream: DuplexStream,
    buffer: String,
}

impl WireReader {
    fn new(stream: DuplexStream) -> Self {
        Self {
            stream,
            buffer: String::new(),
        }
    }

    /// Next `event: message` payload, skipping the endpoint advertisement.
    async fn next_message(&mut self) -> serde_json::Value {
        loop {
            if let Some(pos) = self.buffer.find("\n\n") {
                let block = self.buffer[..pos].to_string();
                self.buffer.drain(..pos + 2);

                let mut event = String::new();
                let mut data = String::new();
                for line in block.lines() {
                    if let Some(value) = line.strip_prefix("event:") {
                        event = value.trim().to_string();
                    } else if let Some(value) = line.strip_prefix("data:") {
                        data = value.trim().to_string();
                    }
                }
                if event == "message" {
                    return serde_json::from_str(&data).expect("non-JSON message event");
                }
                continue;
            }

            let mut chunk = [0u8; 1024];
            let n = self
                .stream
                .read(&mut chunk)
                .await
                .expect("read from wire failed");
            assert!(n > 0, "wire ended mid-event");
            self.buffer
                .push_str(std::str::from_utf8(&chunk[..n]).expect("non-UTF-8 wire bytes"));
        }
    }
}

/// Wire a session over an SSE transport; the returned reader observes
/// outbound traffic and the transport handle injects inbound messages.
fn connect_session() -> (Arc<Session>, Arc<SseServerTransport>, WireReader) {
    let transport = Arc::new(SseServerTransport::new("/message"));
    let (server_side, client_side) = tokio::io::duplex(8192);

    let runner = Arc::clone(&transport);
    tokio::spawn(async move {
        let _ = runner.run(server_side, CancellationToken::new()).await;
    });

    let shared: Arc<dyn Transport> = Arc::clone(&transport) as Arc<dyn Transport>;
    let session = Session::connect(shared);
    (session, transport, WireReader::new(client_side))
}

/// Inject a JSON value as an inbound message.
fn inject(transport: &SseServerTransport, value: serde_json::Value) {
    transport.on_message_received(decode(&value.to_string()).expect("invalid inbound JSON"));
}

async fn next_message(reader: &mut WireReader) -> serde_json::Value {
    tokio::time::timeout(Duration::from_secs(5), reader.next_message())
        .await
        .expect("timed out waiting for wire traffic")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// Two concurrent requests get unique ids and each awaiter receives its own
/// result, even when the responses arrive in reverse order.
#[tokio::test]
async fn test_concurrent_requests_correlated_out_of_order() {
    let (session, transport, mut reader) = connect_session();
    let ctx = CancellationToken::new();

    let first_session = Arc::clone(&session);
    let first_ctx = ctx.clone();
    let first = tokio::spawn(async move {
        first_session
            .send_request::<serde_json::Value>(
                "tools/call",
                Some(serde_json::json!({"name": "first"})),
                &first_ctx,
            )
            .await
    });
    let second_session = Arc::clone(&session);
    let second_ctx = ctx.clone();
    let second = tokio::spawn(async move {
        second_session
            .send_request::<serde_json::Value>(
                "tools/call",
                Some(serde_json::json!({"name": "second"})),
                &second_ctx,
            )
            .await
    });

    // Observe both requests; spawn order does not fix wire order, so map
    // ids by the tool name each request carries.
    let mut id_by_name = std::collections::HashMap::new();
    for _ in 0..2 {
        let request = next_message(&mut reader).await;
        assert_eq!(request["method"], "tools/call");
        let name = request["params"]["name"].as_str().unwrap().to_string();
        id_by_name.insert(name, request["id"].clone());
    }
    assert_ne!(
        id_by_name["first"], id_by_name["second"],
        "each request must get a unique id"
    );

    // Answer in reverse order of issue.
    inject(
        &transport,
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": id_by_name["second"],
            "result": {"served": "second"}
        }),
    );
    inject(
        &transport,
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": id_by_name["first"],
            "result": {"served": "first"}
        }),
    );

    let first_result = first.await.unwrap().unwrap();
    let second_result = second.await.unwrap().unwrap();
    assert_eq!(first_result["served"], "first");
    assert_eq!(second_result["served"], "second");

    transport.close().await.unwrap();
}

/// Cancelling an in-flight request surfaces `Cancelled`, emits exactly one
/// `notifications/cancelled` on the wire, drops the late response silently,
/// and leaves the session usable.
#[tokio::test]
async fn test_cancellation_severs_awaiter_and_notifies_peer() {
    let (session, transport, mut reader) = connect_session();
    let ctx = CancellationToken::new();

    let awaiter_session = Arc::clone(&session);
    let awaiter_ctx = ctx.clone();
    let awaiter = tokio::spawn(async move {
        awaiter_session
            .send_request::<serde_json::Value>(
                "tools/call",
                Some(serde_json::json!({"name": "slow"})),
                &awaiter_ctx,
            )
            .await
    });

    let request = next_message(&mut reader).await;
    assert_eq!(request["method"], "tools/call");
    let request_id = request["id"].clone();

    ctx.cancel();

    let err = tokio::time::timeout(Duration::from_secs(5), awaiter)
        .await
        .expect("awaiter did not settle")
        .expect("awaiter panicked")
        .expect_err("expected Cancelled");
    assert!(matches!(kind_of(&err), Some(McpError::Cancelled)));

    let cancel = next_message(&mut reader).await;
    assert_eq!(cancel["method"], "notifications/cancelled");
    assert_eq!(cancel["params"]["requestId"], request_id);
    assert!(cancel.get("id").is_none(), "notifications must not carry an id");

    // A late response for the cancelled id is dropped without disturbing
    // later traffic.
    inject(
        &transport,
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": request_id,
            "result": {}
        }),
    );

    let fresh_ctx = CancellationToken::new();
    let ping_session = Arc::clone(&session);
    let ping = tokio::spawn(async move {
        ping_session
            .send_request::<serde_json::Value>("ping", None, &fresh_ctx)
            .await
    });
    let request = next_message(&mut reader).await;
    assert_eq!(request["method"], "ping");
    inject(
        &transport,
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": request["id"],
            "result": {}
        }),
    );
    ping.await.unwrap().unwrap();

    transport.close().await.unwrap();
}

/// A progress sink receives the notifications addressed to its request's
/// token, in order, and stops receiving once the response lands.
#[tokio::test]
async fn test_progress_routed_while_request_pending() {
    let (session, transport, mut reader) = connect_session();
    let ctx = CancellationToken::new();
    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();

    let awaiter_session = Arc::clone(&session);
    let awaiter = tokio::spawn(async move {
        awaiter_session
            .send_request_with_progress::<serde_json::Value>(
                "tools/call",
                Some(serde_json::json!({"name": "long"})),
                &ctx,
                progress_tx,
            )
            .await
    });

    let request = next_message(&mut reader).await;
    let token = request["params"]["_meta"]["progressToken"].clone();
    assert_eq!(
        token, request["id"],
        "the request id doubles as the progress token"
    );

    for step in 1..=2 {
        inject(
            &transport,
            serde_json::json!({
                "jsonrpc": "2.0",
                "method": "notifications/progress",
                "params": {"progressToken": token, "progress": step as f64}
            }),
        );
    }
    inject(
        &transport,
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": request["id"],
            "result": {}
        }),
    );
    awaiter.await.unwrap().unwrap();

    for expected in 1..=2 {
        let event = tokio::time::timeout(Duration::from_secs(5), progress_rx.recv())
            .await
            .expect("progress timed out")
            .expect("progress sink closed early");
        assert_eq!(event.progress, expected as f64);
    }

    // After completion the token is unregistered; further notifications for
    // it are dropped.
    inject(
        &transport,
        serde_json::json!({
            "jsonrpc": "2.0",
            "method": "notifications/progress",
            "params": {"progressToken": token, "progress": 3.0}
        }),
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(
        progress_rx.try_recv().is_err(),
        "no progress may be delivered after the response"
    );

    transport.close().await.unwrap();
}

/// A response whose id matches nothing is dropped and the session keeps
/// serving traffic.
#[tokio::test]
async fn test_unknown_response_id_does_not_kill_session() {
    let (session, transport, mut reader) = connect_session();
    let ctx = CancellationToken::new();

    inject(
        &transport,
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": 999,
            "result": {}
        }),
    );

    let ping_session = Arc::clone(&session);
    let ping = tokio::spawn(async move {
        ping_session
            .send_request::<serde_json::Value>("ping", None, &ctx)
            .await
    });
    let request = next_message(&mut reader).await;
    assert_eq!(request["method"], "ping");
    inject(
        &transport,
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": request["id"],
            "result": {"alive": true}
        }),
    );

    let result = ping.await.unwrap().unwrap();
    assert_eq!(result["alive"], true);

    transport.close().await.unwrap();
}

/// A server-initiated request reaches the registered handler and its reply
/// goes back over the wire; unregistered methods get `-32601`.
#[tokio::test]
async fn test_inbound_request_dispatch_and_method_not_found() {
    let (session, transport, mut reader) = connect_session();

    session
        .on_request("sampling/createMessage", |params, _scope| {
            Box::pin(async move {
                let prompt = params
                    .and_then(|p| p.get("prompt").cloned())
                    .unwrap_or(serde_json::Value::Null);
                Ok(serde_json::json!({"echo": prompt}))
            })
        })
        .await;

    inject(
        &transport,
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": "srv-1",
            "method": "sampling/createMessage",
            "params": {"prompt": "hello"}
        }),
    );

    let response = next_message(&mut reader).await;
    assert_eq!(response["id"], "srv-1");
    assert_eq!(response["result"]["echo"], "hello");

    inject(
        &transport,
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": "srv-2",
            "method": "roots/list"
        }),
    );

    let response = next_message(&mut reader).await;
    assert_eq!(response["id"], "srv-2");
    assert_eq!(response["error"]["code"], -32601);

    transport.close().await.unwrap();
}

/// `notify` writes a notification without allocating an id and without
/// consuming one from the request counter.
#[tokio::test]
async fn test_notify_allocates_no_id() {
    let (session, transport, mut reader) = connect_session();
    let ctx = CancellationToken::new();

    session
        .notify("notifications/initialized", Some(serde_json::json!({})))
        .await
        .unwrap();

    let notification = next_message(&mut reader).await;
    assert_eq!(notification["method"], "notifications/initialized");
    assert!(notification.get("id").is_none());

    // The next request still gets the first id in the sequence.
    let ping_session = Arc::clone(&session);
    let ping = tokio::spawn(async move {
        ping_session
            .send_request::<serde_json::Value>("ping", None, &ctx)
            .await
    });
    let request = next_message(&mut reader).await;
    assert_eq!(request["id"], 1);
    inject(
        &transport,
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {}
        }),
    );
    ping.await.unwrap().unwrap();

    transport.close().await.unwrap();
}

/// Closing the transport fails every pending awaiter with
/// `TransportClosed` and the session reports shutdown.
#[tokio::test]
async fn test_transport_closure_fails_pending_awaiters() {
    let (session, transport, mut reader) = connect_session();
    let ctx = CancellationToken::new();

    let awaiter_session = Arc::clone(&session);
    let awaiter = tokio::spawn(async move {
        awaiter_session
            .send_request::<serde_json::Value>("ping", None, &ctx)
            .await
    });

    // Wait for the request so it is parked in the correlation table, then
    // end the inbound side by closing the transport.
    let request = next_message(&mut reader).await;
    assert_eq!(request["method"], "ping");
    transport.close().await.unwrap();

    let err = tokio::time::timeout(Duration::from_secs(5), awaiter)
        .await
        .expect("awaiter hung after transport close")
        .expect("awaiter panicked")
        .expect_err("expected TransportClosed");
    assert!(matches!(kind_of(&err), Some(McpError::TransportClosed)));

    tokio::time::timeout(Duration::from_secs(5), session.closed().cancelled())
        .await
        .expect("session did not observe shutdown");
}
