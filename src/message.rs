//! JSON-RPC 2.0 message model and codec
//!
//! This module defines the tagged message union used on every transport:
//! [`Message`] with its four shapes (request, response, notification, batch),
//! plus the identifier types [`RequestId`] and [`ProgressToken`].
//!
//! # Codec contract
//!
//! - [`encode`] emits canonical JSON-RPC 2.0 with the `jsonrpc` field always
//!   present and `None` fields omitted.
//! - [`decode`] fails with [`McpError::MalformedFrame`] on invalid JSON and
//!   [`McpError::InvalidEnvelope`] when the object is neither a request, a
//!   response, nor a notification.
//! - `params` and `result` subtrees pass through as opaque
//!   [`serde_json::Value`]s, so arbitrary payloads round-trip byte-identically
//!   (modulo JSON whitespace).
//! - Numeric vs. string request ids are preserved on egress.
//!
//! Batches are accepted on ingress; they are emitted only when a caller
//! explicitly constructs [`Message::Batch`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{McpError, Result};

/// The JSON-RPC protocol version string carried by every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

// ---------------------------------------------------------------------------
// Identifier types
// ---------------------------------------------------------------------------

/// A JSON-RPC request identifier: a non-null string or integer.
///
/// Ids chosen by this client are monotonically increasing integers beginning
/// at 1; peers may use strings. The integer/string distinction is preserved
/// through a round-trip.
///
/// # Examples
///
/// ```
/// use mcpkit::message::RequestId;
///
/// let id = RequestId::from(7);
/// assert_eq!(serde_json::to_string(&id).unwrap(), "7");
///
/// let id: RequestId = serde_json::from_str("\"abc\"").unwrap();
/// assert_eq!(id, RequestId::from("abc"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Integer id.
    Number(i64),
    /// String id.
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

/// An opaque progress token: a string or integer chosen by the requester and
/// embedded under `params._meta.progressToken`.
///
/// Uniqueness is scoped to the lifetime of the awaiter that registered it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressToken {
    /// Integer token.
    Number(i64),
    /// String token.
    String(String),
}

impl From<&RequestId> for ProgressToken {
    fn from(id: &RequestId) -> Self {
        match id {
            RequestId::Number(n) => ProgressToken::Number(*n),
            RequestId::String(s) => ProgressToken::String(s.clone()),
        }
    }
}

impl fmt::Display for ProgressToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressToken::Number(n) => write!(f, "{}", n),
            ProgressToken::String(s) => write!(f, "{}", s),
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope shapes
// ---------------------------------------------------------------------------

/// A JSON-RPC 2.0 request object (has both `id` and `method`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Protocol version identifier; always `"2.0"`.
    pub jsonrpc: String,
    /// Request correlation identifier, unique per sender per session.
    pub id: RequestId,
    /// The method name to invoke.
    pub method: String,
    /// Optional method parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    /// Create a request envelope for `method` with the given id and params.
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 error object carried in a response.
///
/// Implements `Display` as `"JSON-RPC error {code}: {message}"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code as defined by JSON-RPC 2.0 or the MCP spec.
    pub code: i64,
    /// Human-readable error description.
    pub message: String,
    /// Optional additional error context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

impl From<JsonRpcError> for McpError {
    fn from(e: JsonRpcError) -> Self {
        McpError::Rpc {
            code: e.code,
            message: e.message,
            data: e.data,
        }
    }
}

/// A JSON-RPC 2.0 response object (has `id` and exactly one of `result` or
/// `error`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Protocol version identifier; always `"2.0"`.
    pub jsonrpc: String,
    /// Mirrors the `id` from the corresponding request.
    pub id: RequestId,
    /// Successful result value; mutually exclusive with `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error object; mutually exclusive with `result`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl Response {
    /// Create a success response carrying `result`.
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response carrying `error`.
    pub fn error(id: RequestId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Split the response into its id and a result-or-error outcome.
    pub fn into_outcome(self) -> (RequestId, std::result::Result<Value, JsonRpcError>) {
        let outcome = match self.error {
            Some(e) => Err(e),
            None => Ok(self.result.unwrap_or(Value::Null)),
        };
        (self.id, outcome)
    }
}

/// A JSON-RPC 2.0 notification (has `method` but no `id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Protocol version identifier; always `"2.0"`.
    pub jsonrpc: String,
    /// The notification method name.
    pub method: String,
    /// Optional notification parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    /// Create a notification envelope for `method`.
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

// ---------------------------------------------------------------------------
// Message union
// ---------------------------------------------------------------------------

/// The shape of a [`Message`], as reported by [`Message::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// A request (id + method).
    Request,
    /// A response (id + result or error).
    Response,
    /// A notification (method, no id).
    Notification,
    /// An ordered sequence of the above.
    Batch,
}

/// A JSON-RPC 2.0 message: request, response, notification, or batch.
///
/// Classification is by key presence, the same rules every dispatch path in
/// this crate uses:
///
/// - `method` + non-null `id` → request
/// - `method`, no `id` → notification
/// - `result` or `error` + `id` → response
/// - JSON array → batch (one level deep; batches do not nest)
///
/// # Examples
///
/// ```
/// use mcpkit::message::{decode, Message, MessageKind};
///
/// let msg = decode(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#).unwrap();
/// assert_eq!(msg.kind(), MessageKind::Request);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Message {
    /// A request (id + method).
    Request(Request),
    /// A response (id + result or error).
    Response(Response),
    /// A notification (method, no id).
    Notification(Notification),
    /// An ordered batch, accepted on ingress and emitted only explicitly.
    Batch(Vec<Message>),
}

impl Message {
    /// Total classification of this message's shape.
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Request(_) => MessageKind::Request,
            Message::Response(_) => MessageKind::Response,
            Message::Notification(_) => MessageKind::Notification,
            Message::Batch(_) => MessageKind::Batch,
        }
    }

    /// Classify and convert a parsed JSON value into a [`Message`].
    ///
    /// # Errors
    ///
    /// Returns [`McpError::InvalidEnvelope`] when the value is not a valid
    /// JSON-RPC 2.0 envelope: neither `method` nor `result`/`error` present,
    /// a response without a usable `id`, an id that is neither an integer nor
    /// a string, an empty batch, or a nested batch.
    pub fn from_value(value: Value) -> Result<Message> {
        match value {
            Value::Array(items) => {
                if items.is_empty() {
                    return Err(McpError::InvalidEnvelope("empty batch".to_string()).into());
                }
                let mut messages = Vec::with_capacity(items.len());
                for item in items {
                    if item.is_array() {
                        return Err(
                            McpError::InvalidEnvelope("nested batch".to_string()).into()
                        );
                    }
                    messages.push(Message::from_value(item)?);
                }
                Ok(Message::Batch(messages))
            }
            Value::Object(_) => Self::from_object(value),
            other => Err(McpError::InvalidEnvelope(format!(
                "expected object or array, got {}",
                json_type_name(&other)
            ))
            .into()),
        }
    }

    /// Classify a single (non-batch) JSON object.
    fn from_object(value: Value) -> Result<Message> {
        let has_id = value.get("id").map(|id| !id.is_null()).unwrap_or(false);
        let has_method = value.get("method").is_some();
        let has_result = value.get("result").is_some();
        let has_error = value.get("error").is_some();

        if has_method {
            if has_id {
                let id = parse_id(&value["id"])?;
                let method = method_str(&value)?;
                let params = value.get("params").cloned();
                Ok(Message::Request(Request::new(id, method, params)))
            } else {
                let method = method_str(&value)?;
                let params = value.get("params").cloned();
                Ok(Message::Notification(Notification::new(method, params)))
            }
        } else if has_result || has_error {
            if has_result && has_error {
                return Err(McpError::InvalidEnvelope(
                    "response carries both result and error".to_string(),
                )
                .into());
            }
            if !has_id {
                return Err(
                    McpError::InvalidEnvelope("response without id".to_string()).into()
                );
            }
            let id = parse_id(&value["id"])?;
            if has_error {
                let error: JsonRpcError = serde_json::from_value(value["error"].clone())
                    .map_err(|e| {
                        McpError::InvalidEnvelope(format!("malformed error object: {}", e))
                    })?;
                Ok(Message::Response(Response::error(id, error)))
            } else {
                Ok(Message::Response(Response::success(
                    id,
                    value["result"].clone(),
                )))
            }
        } else {
            Err(McpError::InvalidEnvelope(
                "neither method nor result/error present".to_string(),
            )
            .into())
        }
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Message::from_value(value).map_err(serde::de::Error::custom)
    }
}

/// Parse a JSON value as a [`RequestId`], rejecting anything that is not an
/// integer or a string.
fn parse_id(value: &Value) -> Result<RequestId> {
    if let Some(n) = value.as_i64() {
        Ok(RequestId::Number(n))
    } else if let Some(s) = value.as_str() {
        Ok(RequestId::String(s.to_string()))
    } else {
        Err(McpError::InvalidEnvelope(format!("id must be string or integer, got {}", value))
            .into())
    }
}

fn method_str(value: &Value) -> Result<String> {
    value["method"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| McpError::InvalidEnvelope("method must be a string".to_string()).into())
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Codec entry points
// ---------------------------------------------------------------------------

/// Encode a message as a single-line JSON string.
///
/// The `jsonrpc` field is always present; `None` fields are omitted.
///
/// # Errors
///
/// Returns [`McpError::Serialization`] if the payload cannot be serialized
/// (practically unreachable for well-formed [`Value`] trees).
pub fn encode(message: &Message) -> Result<String> {
    Ok(serde_json::to_string(message)?)
}

/// Decode one frame into a [`Message`].
///
/// # Errors
///
/// Returns [`McpError::MalformedFrame`] when `raw` is not valid JSON, and
/// [`McpError::InvalidEnvelope`] when it parses but is not a valid JSON-RPC
/// 2.0 envelope.
pub fn decode(raw: &str) -> Result<Message> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| McpError::MalformedFrame(e.to_string()))?;
    Message::from_value(value)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
