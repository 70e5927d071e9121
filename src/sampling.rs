//! Sampling bridge: MCP `sampling/createMessage` over a streaming chat call
//!
//! A server may ask the host application's LLM for a completion by sending
//! `sampling/createMessage`. This module adapts that request onto the
//! [`ChatProvider`] trait: translate the MCP conversation into chat
//! messages, stream the chat call, forward per-update progress when the
//! server attached a progress token, and synthesize a
//! [`CreateMessageResult`] from the accumulated output.
//!
//! # Single-choice heuristic
//!
//! MCP sampling results carry exactly one content choice. The bridge
//! inspects the **last** accumulated chat message: if it contains a binary
//! part, that part wins (the last one, when there are several) and is
//! returned as image or audio content by MIME type; otherwise the message's
//! text parts are concatenated. Callers must not assume multi-part results
//! survive the bridge.

use std::pin::Pin;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::Stream;
use serde_json::Value;
use tokio_stream::StreamExt;

use crate::error::{McpError, Result, CODE_INVALID_PARAMS};
use crate::session::Session;
use crate::types::{
    CreateMessageParams, CreateMessageResult, MessageContent, ProgressParams, PromptMessage,
    ResourceContents, Role, METHOD_SAMPLING_CREATE_MESSAGE, NOTIF_PROGRESS,
};

/// One part of a chat message: text or typed binary data.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatPart {
    /// Plain text.
    Text(String),
    /// Binary data with its MIME type (image, audio).
    Binary {
        /// MIME type, e.g. `"image/png"`.
        mime_type: String,
        /// Raw bytes.
        data: Vec<u8>,
    },
}

/// A chat message handed to the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    /// Who authored the message.
    pub role: Role,
    /// The message parts, in order.
    pub parts: Vec<ChatPart>,
}

/// Generation options extracted from the sampling request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatOptions {
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f64>,
    /// Stop sequences.
    pub stop_sequences: Option<Vec<String>>,
}

/// Why the provider stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// The model finished its turn.
    EndTurn,
    /// Generation hit the token limit.
    MaxTokens,
}

/// One incremental update from a streaming chat call.
///
/// An update with `role` set starts a new message; an update without one
/// appends to the message in progress.
#[derive(Debug, Clone, Default)]
pub struct ChatUpdate {
    /// Starts a new message with this role when set.
    pub role: Option<Role>,
    /// Content delta.
    pub part: Option<ChatPart>,
    /// Model identifier, when the provider reports it.
    pub model: Option<String>,
    /// Finish reason, on the final update.
    pub finish_reason: Option<FinishReason>,
}

impl ChatUpdate {
    /// A text delta for the message in progress.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            part: Some(ChatPart::Text(text.into())),
            ..Self::default()
        }
    }
}

/// A stream of chat updates.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatUpdate>> + Send>>;

/// Streaming chat seam implemented by the host application.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use mcpkit::sampling::{ChatMessage, ChatOptions, ChatStream, ChatProvider, ChatUpdate};
///
/// struct Canned;
///
/// #[async_trait]
/// impl ChatProvider for Canned {
///     async fn stream_chat(
///         &self,
///         _messages: Vec<ChatMessage>,
///         _options: ChatOptions,
///     ) -> mcpkit::error::Result<ChatStream> {
///         Ok(Box::pin(futures::stream::iter(vec![Ok(ChatUpdate::text("ok"))])))
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait ChatProvider: Send + Sync {
    /// Start a streaming completion for `messages` with `options`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying model call cannot be started.
    async fn stream_chat(
        &self,
        messages: Vec<ChatMessage>,
        options: ChatOptions,
    ) -> Result<ChatStream>;
}

/// Install `provider` as this session's `sampling/createMessage` handler.
///
/// The handler deserializes the request, runs [`create_message`], and sends
/// the synthesized result back as the JSON-RPC response. Malformed params
/// produce a `-32602` error response; provider failures a `-32603`.
pub async fn register_sampling_provider(session: &Arc<Session>, provider: Arc<dyn ChatProvider>) {
    let weak = Arc::downgrade(session);
    session
        .on_request(METHOD_SAMPLING_CREATE_MESSAGE, move |params, _scope| {
            let provider = Arc::clone(&provider);
            let weak = weak.clone();
            Box::pin(async move {
                let params: CreateMessageParams =
                    serde_json::from_value(params.unwrap_or(Value::Null)).map_err(|e| {
                        McpError::Rpc {
                            code: CODE_INVALID_PARAMS,
                            message: format!("invalid sampling params: {e}"),
                            data: None,
                        }
                    })?;
                // The session reference is weak so handler registration does
                // not keep a dropped session alive; without it progress is
                // simply not forwarded.
                let session = weak.upgrade();
                let result =
                    create_message(provider.as_ref(), session.as_deref(), params).await?;
                Ok(serde_json::to_value(result)?)
            })
        })
        .await;
}

/// Run one sampling request through the provider.
///
/// Streams the chat call, forwarding one `notifications/progress` per update
/// (with `progress` = number of updates received so far) when the request
/// carries `_meta.progressToken` and a session is available.
///
/// # Errors
///
/// Returns [`McpError::InvalidArgument`] for undecodable message content and
/// propagates provider errors.
pub async fn create_message(
    provider: &dyn ChatProvider,
    session: Option<&Session>,
    params: CreateMessageParams,
) -> Result<CreateMessageResult> {
    let progress_token = params.progress_token();
    let (messages, options) = translate_request(&params)?;

    let mut stream = provider.stream_chat(messages, options).await?;
    let mut accumulator = Accumulator::default();
    let mut updates_received: u64 = 0;

    while let Some(update) = stream.next().await {
        let update = update?;
        updates_received += 1;
        accumulator.apply(update);

        if let (Some(token), Some(session)) = (&progress_token, session) {
            let progress = ProgressParams {
                progress_token: token.clone(),
                progress: updates_received as f64,
                total: None,
                message: None,
            };
            if let Ok(value) = serde_json::to_value(progress) {
                // Progress is advisory; delivery failures are ignored.
                let _ = session.notify(NOTIF_PROGRESS, Some(value)).await;
            }
        }
    }

    Ok(accumulator.finish())
}

/// Translate sampling params into provider messages and options.
fn translate_request(
    params: &CreateMessageParams,
) -> Result<(Vec<ChatMessage>, ChatOptions)> {
    let mut messages = Vec::with_capacity(params.messages.len());
    for message in &params.messages {
        messages.push(ChatMessage {
            role: message.role,
            parts: vec![translate_content(message)?],
        });
    }

    let options = ChatOptions {
        max_tokens: params.max_tokens,
        temperature: params.temperature,
        stop_sequences: params.stop_sequences.clone(),
    };
    Ok((messages, options))
}

fn translate_content(message: &PromptMessage) -> Result<ChatPart> {
    match &message.content {
        MessageContent::Text { text } => Ok(ChatPart::Text(text.clone())),
        MessageContent::Image { data, mime_type } => Ok(ChatPart::Binary {
            mime_type: mime_type.clone(),
            data: decode_base64(data, "image")?,
        }),
        MessageContent::Audio { data, mime_type } => Ok(ChatPart::Binary {
            mime_type: mime_type.clone(),
            data: decode_base64(data, "audio")?,
        }),
        MessageContent::Resource { resource } => match resource {
            ResourceContents::Text(text) => Ok(ChatPart::Text(text.text.clone())),
            ResourceContents::Blob(blob) => Ok(ChatPart::Binary {
                mime_type: blob
                    .mime_type
                    .clone()
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
                data: decode_base64(&blob.blob, "resource blob")?,
            }),
        },
    }
}

fn decode_base64(data: &str, what: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(data)
        .map_err(|e| McpError::InvalidArgument(format!("undecodable {what} content: {e}")).into())
}

/// Accumulates streamed updates into whole chat messages.
#[derive(Default)]
struct Accumulator {
    messages: Vec<ChatMessage>,
    model: Option<String>,
    finish_reason: Option<FinishReason>,
}

impl Accumulator {
    fn apply(&mut self, update: ChatUpdate) {
        if let Some(model) = update.model {
            self.model = Some(model);
        }
        if let Some(reason) = update.finish_reason {
            self.finish_reason = Some(reason);
        }

        match update.role {
            Some(role) => {
                self.messages.push(ChatMessage {
                    role,
                    parts: update.part.into_iter().collect(),
                });
            }
            None => {
                if let Some(part) = update.part {
                    match self.messages.last_mut() {
                        Some(last) => last.parts.push(part),
                        // A delta before any role defaults the message to
                        // the assistant.
                        None => self.messages.push(ChatMessage {
                            role: Role::Assistant,
                            parts: vec![part],
                        }),
                    }
                }
            }
        }
    }

    fn finish(self) -> CreateMessageResult {
        let (role, content) = match self.messages.last() {
            Some(last) => (last.role, select_content(last)),
            None => (
                Role::Assistant,
                MessageContent::Text {
                    text: String::new(),
                },
            ),
        };

        let stop_reason = match self.finish_reason {
            Some(FinishReason::MaxTokens) => "maxTokens",
            _ => "endTurn",
        };

        CreateMessageResult {
            role,
            content,
            model: self.model.unwrap_or_else(|| "unknown".to_string()),
            stop_reason: Some(stop_reason.to_string()),
        }
    }
}

/// Reduce a message to the single MCP content choice: the last binary part
/// if any exists, else the concatenated text.
fn select_content(message: &ChatMessage) -> MessageContent {
    for part in message.parts.iter().rev() {
        if let ChatPart::Binary { mime_type, data } = part {
            let data = BASE64.encode(data);
            return if mime_type.starts_with("audio/") {
                MessageContent::Audio {
                    data,
                    mime_type: mime_type.clone(),
                }
            } else {
                MessageContent::Image {
                    data,
                    mime_type: mime_type.clone(),
                }
            };
        }
    }

    let text: String = message
        .parts
        .iter()
        .filter_map(|part| match part {
            ChatPart::Text(text) => Some(text.as_str()),
            ChatPart::Binary { .. } => None,
        })
        .collect();
    MessageContent::Text { text }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
