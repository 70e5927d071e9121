//! MCP capability payload types and method-name constants
//!
//! Wire types for the operations exposed by [`crate::client::Client`] and the
//! sampling subprotocol. All types derive `Debug`, `Clone`, `Serialize`, and
//! `Deserialize`. Struct fields are `camelCase` on the wire via
//! `#[serde(rename_all = "camelCase")]`, and all `Option<>` fields omit their
//! key from JSON when `None`.
//!
//! Capability descriptors ([`Tool`], [`Prompt`], [`Resource`],
//! [`ResourceTemplate`]) keep unknown metadata in a flattened `extra` map, so
//! server-provided schema fields pass through untouched; only the paging
//! envelope is interpreted by this crate.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::ProgressToken;

// ---------------------------------------------------------------------------
// JSON-RPC method constants
// ---------------------------------------------------------------------------

/// Keepalive ping.
pub const METHOD_PING: &str = "ping";
/// Request a page of available tools.
pub const METHOD_TOOLS_LIST: &str = "tools/list";
/// Invoke a named tool.
pub const METHOD_TOOLS_CALL: &str = "tools/call";
/// Request a page of available prompts.
pub const METHOD_PROMPTS_LIST: &str = "prompts/list";
/// Retrieve a rendered prompt by name.
pub const METHOD_PROMPTS_GET: &str = "prompts/get";
/// Request a page of available resources.
pub const METHOD_RESOURCES_LIST: &str = "resources/list";
/// Read the contents of a resource by URI.
pub const METHOD_RESOURCES_READ: &str = "resources/read";
/// List URI templates for parameterized resources.
pub const METHOD_RESOURCES_TEMPLATES_LIST: &str = "resources/templates/list";
/// Subscribe to live updates for a resource URI.
pub const METHOD_RESOURCES_SUBSCRIBE: &str = "resources/subscribe";
/// Unsubscribe from a resource URI.
pub const METHOD_RESOURCES_UNSUBSCRIBE: &str = "resources/unsubscribe";
/// Request argument completions for a prompt or resource template.
pub const METHOD_COMPLETION_COMPLETE: &str = "completion/complete";
/// Set the server-side logging verbosity level.
pub const METHOD_LOGGING_SET_LEVEL: &str = "logging/setLevel";
/// Server-initiated: ask the client to generate a completion sample.
pub const METHOD_SAMPLING_CREATE_MESSAGE: &str = "sampling/createMessage";

/// Either side reports progress on a long-running operation.
pub const NOTIF_PROGRESS: &str = "notifications/progress";
/// Either side signals that a prior request has been cancelled.
pub const NOTIF_CANCELLED: &str = "notifications/cancelled";

// ---------------------------------------------------------------------------
// Pagination envelope
// ---------------------------------------------------------------------------

/// Generic paginated request parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedParams {
    /// Opaque cursor from a previous response; absent on the first page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

// ---------------------------------------------------------------------------
// Tool types
// ---------------------------------------------------------------------------

/// A tool exposed by an MCP server.
///
/// # Examples
///
/// ```
/// use mcpkit::types::Tool;
///
/// let tool: Tool = serde_json::from_value(serde_json::json!({
///     "name": "search",
///     "description": "Search the web",
///     "inputSchema": { "type": "object" }
/// })).unwrap();
/// assert_eq!(tool.name, "search");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    /// Unique name of the tool within the server.
    pub name: String,
    /// Human-readable description of the tool's purpose.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema describing the tool's input parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
    /// Any additional server-provided metadata, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Response to a `tools/list` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsResult {
    /// Tools in this page of results.
    pub tools: Vec<Tool>,
    /// Opaque cursor for the next page; `None` means this is the last page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Parameters for a `tools/call` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolParams {
    /// Name of the tool to invoke.
    pub name: String,
    /// Arguments to pass to the tool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<serde_json::Map<String, Value>>,
}

/// A single content item produced by a tool call, discriminated by `"type"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Plain text output.
    Text {
        /// The text content.
        text: String,
    },
    /// A base64-encoded image.
    Image {
        /// Base64-encoded image bytes.
        data: String,
        /// MIME type of the image (e.g. `"image/png"`).
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// A base64-encoded audio clip.
    Audio {
        /// Base64-encoded audio bytes.
        data: String,
        /// MIME type of the audio (e.g. `"audio/wav"`).
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// An embedded resource.
    Resource {
        /// The resource contents.
        resource: ResourceContents,
    },
}

/// Response from a `tools/call` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    /// The content items produced by the tool.
    pub content: Vec<ToolContent>,
    /// When `true`, the tool signalled an error condition within its content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

// ---------------------------------------------------------------------------
// Resource types
// ---------------------------------------------------------------------------

/// Text-based resource contents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextResourceContents {
    /// Canonical URI that identifies this resource.
    pub uri: String,
    /// MIME type of the text (e.g. `"text/plain"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// The text content of the resource.
    pub text: String,
}

/// Binary (blob) resource contents, base64-encoded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlobResourceContents {
    /// Canonical URI that identifies this resource.
    pub uri: String,
    /// MIME type of the binary data (e.g. `"application/octet-stream"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Base64-encoded binary data.
    pub blob: String,
}

/// Either text or binary resource contents.
///
/// Uses `#[serde(untagged)]` so the discriminator is presence of `"text"` vs
/// `"blob"` in the JSON object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ResourceContents {
    /// UTF-8 text resource.
    Text(TextResourceContents),
    /// Binary resource (base64-encoded blob).
    Blob(BlobResourceContents),
}

/// Metadata describing a resource exposed by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Canonical URI for this resource.
    pub uri: String,
    /// Human-readable resource name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// MIME type, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Any additional server-provided metadata, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// A URI template for parameterized resource access.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTemplate {
    /// RFC 6570 URI template string.
    pub uri_template: String,
    /// Human-readable name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// MIME type of resources matched by this template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Any additional server-provided metadata, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Response to a `resources/list` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResourcesResult {
    /// Resources in this page.
    pub resources: Vec<Resource>,
    /// Opaque cursor for the next page; `None` means this is the last page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Response to a `resources/templates/list` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResourceTemplatesResult {
    /// Templates in this page.
    pub resource_templates: Vec<ResourceTemplate>,
    /// Opaque cursor for the next page; `None` means this is the last page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Parameters for `resources/read`, `resources/subscribe`, and
/// `resources/unsubscribe`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceParams {
    /// URI of the resource.
    pub uri: String,
}

/// Response to a `resources/read` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadResourceResult {
    /// One or more content objects representing the resource's current state.
    pub contents: Vec<ResourceContents>,
}

// ---------------------------------------------------------------------------
// Prompt types
// ---------------------------------------------------------------------------

/// Conversation participant role.
///
/// # Examples
///
/// ```
/// use mcpkit::types::Role;
///
/// let r: Role = serde_json::from_str("\"user\"").unwrap();
/// assert_eq!(r, Role::User);
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A message from the human user.
    User,
    /// A message from the AI assistant.
    Assistant,
}

/// Content within a prompt or sampling message, discriminated by `"type"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageContent {
    /// Plain text.
    Text {
        /// The text body.
        text: String,
    },
    /// A base64-encoded image.
    Image {
        /// Base64-encoded image bytes.
        data: String,
        /// MIME type of the image.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// A base64-encoded audio clip.
    Audio {
        /// Base64-encoded audio bytes.
        data: String,
        /// MIME type of the audio.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// An embedded resource.
    Resource {
        /// The embedded resource contents.
        resource: ResourceContents,
    },
}

/// A single message in a prompt or sampling conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PromptMessage {
    /// Who authored this message.
    pub role: Role,
    /// The message body.
    pub content: MessageContent,
}

/// Metadata describing a prompt template exposed by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    /// Unique name of this prompt.
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Any additional server-provided metadata, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Response to a `prompts/list` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPromptsResult {
    /// Prompts in this page.
    pub prompts: Vec<Prompt>,
    /// Opaque cursor for the next page; `None` means this is the last page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Parameters for `prompts/get`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPromptParams {
    /// Name of the prompt to retrieve.
    pub name: String,
    /// Template argument substitutions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<serde_json::Map<String, Value>>,
}

/// Response to a `prompts/get` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPromptResult {
    /// Human-readable description of what this prompt does.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The rendered prompt messages ready to send to an LLM.
    pub messages: Vec<PromptMessage>,
}

// ---------------------------------------------------------------------------
// Completion types
// ---------------------------------------------------------------------------

/// Reference to the prompt or resource template being completed.
///
/// Discriminated by `"type"` on the wire: `"ref/prompt"` or `"ref/resource"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum CompletionReference {
    /// Completion against a prompt template argument.
    #[serde(rename = "ref/prompt")]
    Prompt {
        /// Name of the prompt.
        name: String,
    },
    /// Completion against a resource template URI.
    #[serde(rename = "ref/resource")]
    Resource {
        /// RFC 6570 template URI.
        uri: String,
    },
}

impl CompletionReference {
    /// Check that the reference carries a non-blank name or URI.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::McpError::InvalidArgument`] when the name or
    /// URI is empty or whitespace-only.
    pub fn validate(&self) -> crate::error::Result<()> {
        let (field, value) = match self {
            CompletionReference::Prompt { name } => ("reference name", name),
            CompletionReference::Resource { uri } => ("reference uri", uri),
        };
        if value.trim().is_empty() {
            return Err(crate::error::McpError::InvalidArgument(format!(
                "{} must not be empty",
                field
            ))
            .into());
        }
        Ok(())
    }
}

/// The argument whose value is being completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteArgument {
    /// Argument name.
    pub name: String,
    /// Partial value typed so far.
    pub value: String,
}

/// Parameters for `completion/complete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteParams {
    /// Reference to the prompt or resource template being completed.
    #[serde(rename = "ref")]
    pub reference: CompletionReference,
    /// The argument whose value is being completed.
    pub argument: CompleteArgument,
}

/// A single completion result object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    /// The suggested completion strings.
    pub values: Vec<String>,
    /// Total number of completions available server-side.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u32>,
    /// Whether more pages of completions are available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_more: Option<bool>,
}

/// Response to a `completion/complete` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteResult {
    /// The completion result.
    pub completion: Completion,
}

// ---------------------------------------------------------------------------
// Logging types
// ---------------------------------------------------------------------------

/// Syslog-inspired severity levels for MCP log messages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    /// Verbose diagnostic information.
    Debug,
    /// General operational information.
    Info,
    /// Normal but significant events.
    Notice,
    /// Potential problems that don't prevent operation.
    Warning,
    /// Error conditions that affect a specific operation.
    Error,
    /// Severe conditions that affect broad functionality.
    Critical,
    /// Immediate action required.
    Alert,
    /// System is unusable.
    Emergency,
}

/// Generic host-side severity, for callers that do not speak MCP levels.
///
/// Converted to [`LoggingLevel`] by a fixed table:
/// `trace→debug, debug→debug, info→info, warn→warning, error→error,
/// critical→critical, none→emergency`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Finest-grained diagnostics.
    Trace,
    /// Diagnostics.
    Debug,
    /// Routine information.
    Info,
    /// Potential problems.
    Warn,
    /// Operation-level failures.
    Error,
    /// Broad failures.
    Critical,
    /// Logging disabled; only the most severe messages pass.
    None,
}

impl From<Severity> for LoggingLevel {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Trace | Severity::Debug => LoggingLevel::Debug,
            Severity::Info => LoggingLevel::Info,
            Severity::Warn => LoggingLevel::Warning,
            Severity::Error => LoggingLevel::Error,
            Severity::Critical => LoggingLevel::Critical,
            Severity::None => LoggingLevel::Emergency,
        }
    }
}

/// Parameters for `logging/setLevel`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetLevelParams {
    /// The minimum severity the server should emit.
    pub level: LoggingLevel,
}

// ---------------------------------------------------------------------------
// Progress and cancellation notification payloads
// ---------------------------------------------------------------------------

/// Parameters for the `notifications/progress` notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressParams {
    /// Opaque token identifying the long-running operation.
    pub progress_token: ProgressToken,
    /// How much work has been completed so far.
    pub progress: f64,
    /// Total amount of work, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    /// Optional status message to display.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Parameters for the `notifications/cancelled` notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelledParams {
    /// The `id` of the request being cancelled.
    pub request_id: crate::message::RequestId,
    /// Human-readable reason for cancellation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// ---------------------------------------------------------------------------
// Sampling types
// ---------------------------------------------------------------------------

/// Server-initiated request asking the client to generate a completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageParams {
    /// The conversation history to complete.
    pub messages: Vec<PromptMessage>,
    /// Optional system prompt to prepend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Optional stop sequences.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    /// Request metadata; carries `progressToken` when the server wants
    /// incremental progress.
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl CreateMessageParams {
    /// Extract the progress token from `_meta.progressToken`, if present.
    pub fn progress_token(&self) -> Option<ProgressToken> {
        let token = self.meta.as_ref()?.get("progressToken")?;
        serde_json::from_value(token.clone()).ok()
    }
}

/// The client's response to a `sampling/createMessage` server request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageResult {
    /// Role of the generated message.
    pub role: Role,
    /// The generated content: a single text, image, or audio choice.
    pub content: MessageContent,
    /// The model that produced this result, or `"unknown"`.
    pub model: String,
    /// Why generation stopped: `"maxTokens"` or `"endTurn"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_preserves_unknown_metadata() {
        let json = serde_json::json!({
            "name": "search",
            "inputSchema": {"type": "object"},
            "annotations": {"readOnlyHint": true}
        });
        let tool: Tool = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(tool.name, "search");
        assert!(tool.extra.contains_key("annotations"));
        let back = serde_json::to_value(&tool).unwrap();
        assert_eq!(back["annotations"]["readOnlyHint"], true);
    }

    #[test]
    fn test_paginated_params_omit_absent_cursor() {
        let params = PaginatedParams { cursor: None };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json, serde_json::json!({}));

        let params = PaginatedParams {
            cursor: Some("c1".to_string()),
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json, serde_json::json!({"cursor": "c1"}));
    }

    #[test]
    fn test_tool_content_wire_shape() {
        let c = ToolContent::Text {
            text: "hello".to_string(),
        };
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["text"], "hello");

        let c = ToolContent::Image {
            data: "AAAA".to_string(),
            mime_type: "image/png".to_string(),
        };
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["mimeType"], "image/png");
    }

    #[test]
    fn test_resource_contents_untagged_discrimination() {
        let text: ResourceContents = serde_json::from_value(serde_json::json!({
            "uri": "file:///a.txt", "text": "body"
        }))
        .unwrap();
        assert!(matches!(text, ResourceContents::Text(_)));

        let blob: ResourceContents = serde_json::from_value(serde_json::json!({
            "uri": "file:///a.bin", "blob": "AAAA"
        }))
        .unwrap();
        assert!(matches!(blob, ResourceContents::Blob(_)));
    }

    #[test]
    fn test_completion_reference_wire_tags() {
        let r = CompletionReference::Prompt {
            name: "greet".to_string(),
        };
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["type"], "ref/prompt");

        let r = CompletionReference::Resource {
            uri: "file:///{path}".to_string(),
        };
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["type"], "ref/resource");
    }

    #[test]
    fn test_completion_reference_validate() {
        assert!(CompletionReference::Prompt {
            name: "greet".to_string()
        }
        .validate()
        .is_ok());
        assert!(CompletionReference::Prompt {
            name: "   ".to_string()
        }
        .validate()
        .is_err());
        assert!(CompletionReference::Resource {
            uri: String::new()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_logging_level_serialization() {
        assert_eq!(
            serde_json::to_string(&LoggingLevel::Warning).unwrap(),
            "\"warning\""
        );
        assert_eq!(
            serde_json::to_string(&LoggingLevel::Emergency).unwrap(),
            "\"emergency\""
        );
    }

    #[test]
    fn test_severity_mapping_table() {
        assert_eq!(LoggingLevel::from(Severity::Trace), LoggingLevel::Debug);
        assert_eq!(LoggingLevel::from(Severity::Debug), LoggingLevel::Debug);
        assert_eq!(LoggingLevel::from(Severity::Info), LoggingLevel::Info);
        assert_eq!(LoggingLevel::from(Severity::Warn), LoggingLevel::Warning);
        assert_eq!(LoggingLevel::from(Severity::Error), LoggingLevel::Error);
        assert_eq!(
            LoggingLevel::from(Severity::Critical),
            LoggingLevel::Critical
        );
        assert_eq!(LoggingLevel::from(Severity::None), LoggingLevel::Emergency);
    }

    #[test]
    fn test_progress_params_wire_shape() {
        let params = ProgressParams {
            progress_token: ProgressToken::String("p1".to_string()),
            progress: 3.0,
            total: None,
            message: None,
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json, serde_json::json!({"progressToken": "p1", "progress": 3.0}));
    }

    #[test]
    fn test_cancelled_params_wire_shape() {
        let params = CancelledParams {
            request_id: crate::message::RequestId::Number(5),
            reason: Some("client cancelled".to_string()),
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["requestId"], 5);
        assert_eq!(json["reason"], "client cancelled");
    }

    #[test]
    fn test_create_message_params_progress_token() {
        let params: CreateMessageParams = serde_json::from_value(serde_json::json!({
            "messages": [],
            "maxTokens": 100,
            "_meta": {"progressToken": "tok-1"}
        }))
        .unwrap();
        assert_eq!(
            params.progress_token(),
            Some(ProgressToken::String("tok-1".to_string()))
        );

        let params: CreateMessageParams =
            serde_json::from_value(serde_json::json!({"messages": []})).unwrap();
        assert!(params.progress_token().is_none());
    }

    #[test]
    fn test_prompt_message_round_trip() {
        let msg = PromptMessage {
            role: Role::Assistant,
            content: MessageContent::Text {
                text: "hi".to_string(),
            },
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"]["type"], "text");
        let back: PromptMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }
}
