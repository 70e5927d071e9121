//! Typed MCP client façade
//!
//! [`Client`] wraps a [`Session`] and exposes every client-side MCP
//! operation as a typed async method: `ping`, tools, prompts, resources,
//! resource templates, subscriptions, argument completion, and the logging
//! level control.
//!
//! The four paged list operations come in two forms each: `list_*` gathers
//! every page into a `Vec` and `enumerate_*` returns a lazy, finite,
//! non-restartable stream that issues fresh page requests per invocation
//! (materialize with `list_*` when caching is wanted).
//!
//! Caller-side preconditions (non-empty names and URIs, valid completion
//! references) are checked before any wire activity and fail with
//! [`McpError::InvalidArgument`].

use std::sync::Arc;

use futures::Stream;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{McpError, Result};
use crate::paginate::{fetch_all, page_stream};
use crate::session::{ProgressSink, Session};
use crate::types::{
    CallToolParams, CallToolResult, CompleteArgument, CompleteParams, CompleteResult,
    Completion, CompletionReference, GetPromptParams, GetPromptResult, ListPromptsResult,
    ListResourceTemplatesResult, ListResourcesResult, ListToolsResult, LoggingLevel,
    PaginatedParams, Prompt, ReadResourceResult, Resource, ResourceContents, ResourceParams,
    ResourceTemplate, SetLevelParams, Tool, METHOD_COMPLETION_COMPLETE,
    METHOD_LOGGING_SET_LEVEL, METHOD_PING, METHOD_PROMPTS_GET, METHOD_PROMPTS_LIST,
    METHOD_RESOURCES_LIST, METHOD_RESOURCES_READ, METHOD_RESOURCES_SUBSCRIBE,
    METHOD_RESOURCES_TEMPLATES_LIST, METHOD_RESOURCES_UNSUBSCRIBE, METHOD_TOOLS_CALL,
    METHOD_TOOLS_LIST,
};

/// A mapping from argument name to an arbitrary JSON value.
pub type Arguments = serde_json::Map<String, Value>;

/// Marshal caller-native values into an [`Arguments`] map.
///
/// Each value is serialized to JSON; values that are already
/// [`serde_json::Value`]s pass through unchanged.
///
/// # Errors
///
/// Returns [`McpError::Serialization`] when a value cannot be represented as
/// JSON.
///
/// # Examples
///
/// ```
/// use mcpkit::client::arguments;
///
/// let args = arguments([
///     ("query", serde_json::json!("rust")),
///     ("limit", serde_json::json!(5)),
/// ]).unwrap();
/// assert_eq!(args["limit"], 5);
/// ```
pub fn arguments<I, K, V>(pairs: I) -> Result<Arguments>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Serialize,
{
    let mut map = Arguments::new();
    for (key, value) in pairs {
        map.insert(key.into(), serde_json::to_value(value).map_err(McpError::Serialization)?);
    }
    Ok(map)
}

/// Check a caller-supplied identifier before any wire activity.
fn require_non_blank(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(McpError::InvalidArgument(format!(
            "{} must not be empty or whitespace-only",
            field
        ))
        .into());
    }
    Ok(())
}

/// Typed operation surface over one MCP session.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use mcpkit::client::Client;
/// use mcpkit::session::Session;
/// use mcpkit::transport::stdio::{StdioOptions, StdioTransport};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let transport = Arc::new(StdioTransport::spawn(StdioOptions::new("mcp-server"))?);
/// let client = Client::new(Session::connect(transport));
/// let ctx = CancellationToken::new();
///
/// client.ping(&ctx).await?;
/// for tool in client.list_tools(&ctx).await? {
///     println!("{}", tool.name);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    session: Arc<Session>,
}

impl Client {
    /// Wrap a connected session.
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// The underlying session, for notification observers or raw requests.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Close the underlying transport.
    ///
    /// # Errors
    ///
    /// Propagates transport shutdown errors.
    pub async fn close(&self) -> Result<()> {
        self.session.close().await
    }

    /// Send a `ping` and wait for the empty acknowledgement.
    ///
    /// # Errors
    ///
    /// Propagates session errors ([`McpError::Cancelled`],
    /// [`McpError::TransportClosed`], [`McpError::Rpc`]).
    pub async fn ping(&self, ctx: &CancellationToken) -> Result<()> {
        let _: Value = self.session.send_request(METHOD_PING, None, ctx).await?;
        Ok(())
    }

    /// One paged list request.
    async fn page<Resp>(
        &self,
        method: &str,
        cursor: Option<String>,
        ctx: &CancellationToken,
    ) -> Result<Resp>
    where
        Resp: serde::de::DeserializeOwned,
    {
        let params = serde_json::to_value(PaginatedParams { cursor })?;
        self.session.send_request(method, Some(params), ctx).await
    }

    // -----------------------------------------------------------------------
    // Tools
    // -----------------------------------------------------------------------

    /// List all tools advertised by the server, following pagination
    /// automatically.
    ///
    /// # Errors
    ///
    /// Returns an error if any paged request fails; partial pages are
    /// discarded.
    pub async fn list_tools(&self, ctx: &CancellationToken) -> Result<Vec<Tool>> {
        fetch_all(|cursor| async move {
            let resp: ListToolsResult = self.page(METHOD_TOOLS_LIST, cursor, ctx).await?;
            Ok((resp.tools, resp.next_cursor))
        })
        .await
    }

    /// Lazily enumerate all tools, fetching pages on demand.
    pub fn enumerate_tools<'a>(
        &'a self,
        ctx: &'a CancellationToken,
    ) -> impl Stream<Item = Result<Tool>> + 'a {
        page_stream(move |cursor| async move {
            let resp: ListToolsResult = self.page(METHOD_TOOLS_LIST, cursor, ctx).await?;
            Ok((resp.tools, resp.next_cursor))
        })
    }

    /// Invoke a named tool on the server.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::InvalidArgument`] (before any wire activity) when
    /// `name` is blank; otherwise propagates session errors.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Arguments>,
        ctx: &CancellationToken,
    ) -> Result<CallToolResult> {
        require_non_blank("tool name", name)?;
        let params = serde_json::to_value(CallToolParams {
            name: name.to_string(),
            arguments,
        })?;
        self.session
            .send_request(METHOD_TOOLS_CALL, Some(params), ctx)
            .await
    }

    /// Invoke a named tool, forwarding `notifications/progress` for this
    /// call to `progress` while it is in flight.
    ///
    /// # Errors
    ///
    /// As [`Client::call_tool`].
    pub async fn call_tool_with_progress(
        &self,
        name: &str,
        arguments: Option<Arguments>,
        ctx: &CancellationToken,
        progress: ProgressSink,
    ) -> Result<CallToolResult> {
        require_non_blank("tool name", name)?;
        let params = serde_json::to_value(CallToolParams {
            name: name.to_string(),
            arguments,
        })?;
        self.session
            .send_request_with_progress(METHOD_TOOLS_CALL, Some(params), ctx, progress)
            .await
    }

    // -----------------------------------------------------------------------
    // Prompts
    // -----------------------------------------------------------------------

    /// List all prompts advertised by the server, following pagination
    /// automatically.
    ///
    /// # Errors
    ///
    /// Returns an error if any paged request fails.
    pub async fn list_prompts(&self, ctx: &CancellationToken) -> Result<Vec<Prompt>> {
        fetch_all(|cursor| async move {
            let resp: ListPromptsResult = self.page(METHOD_PROMPTS_LIST, cursor, ctx).await?;
            Ok((resp.prompts, resp.next_cursor))
        })
        .await
    }

    /// Lazily enumerate all prompts, fetching pages on demand.
    pub fn enumerate_prompts<'a>(
        &'a self,
        ctx: &'a CancellationToken,
    ) -> impl Stream<Item = Result<Prompt>> + 'a {
        page_stream(move |cursor| async move {
            let resp: ListPromptsResult = self.page(METHOD_PROMPTS_LIST, cursor, ctx).await?;
            Ok((resp.prompts, resp.next_cursor))
        })
    }

    /// Retrieve a rendered prompt by name, substituting template arguments.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::InvalidArgument`] when `name` is blank; otherwise
    /// propagates session errors.
    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: Option<Arguments>,
        ctx: &CancellationToken,
    ) -> Result<GetPromptResult> {
        require_non_blank("prompt name", name)?;
        let params = serde_json::to_value(GetPromptParams {
            name: name.to_string(),
            arguments,
        })?;
        self.session
            .send_request(METHOD_PROMPTS_GET, Some(params), ctx)
            .await
    }

    // -----------------------------------------------------------------------
    // Resources
    // -----------------------------------------------------------------------

    /// List all resources advertised by the server, following pagination
    /// automatically.
    ///
    /// # Errors
    ///
    /// Returns an error if any paged request fails.
    pub async fn list_resources(&self, ctx: &CancellationToken) -> Result<Vec<Resource>> {
        fetch_all(|cursor| async move {
            let resp: ListResourcesResult =
                self.page(METHOD_RESOURCES_LIST, cursor, ctx).await?;
            Ok((resp.resources, resp.next_cursor))
        })
        .await
    }

    /// Lazily enumerate all resources, fetching pages on demand.
    pub fn enumerate_resources<'a>(
        &'a self,
        ctx: &'a CancellationToken,
    ) -> impl Stream<Item = Result<Resource>> + 'a {
        page_stream(move |cursor| async move {
            let resp: ListResourcesResult =
                self.page(METHOD_RESOURCES_LIST, cursor, ctx).await?;
            Ok((resp.resources, resp.next_cursor))
        })
    }

    /// List all resource templates, following pagination automatically.
    ///
    /// # Errors
    ///
    /// Returns an error if any paged request fails.
    pub async fn list_resource_templates(
        &self,
        ctx: &CancellationToken,
    ) -> Result<Vec<ResourceTemplate>> {
        fetch_all(|cursor| async move {
            let resp: ListResourceTemplatesResult = self
                .page(METHOD_RESOURCES_TEMPLATES_LIST, cursor, ctx)
                .await?;
            Ok((resp.resource_templates, resp.next_cursor))
        })
        .await
    }

    /// Lazily enumerate all resource templates, fetching pages on demand.
    pub fn enumerate_resource_templates<'a>(
        &'a self,
        ctx: &'a CancellationToken,
    ) -> impl Stream<Item = Result<ResourceTemplate>> + 'a {
        page_stream(move |cursor| async move {
            let resp: ListResourceTemplatesResult = self
                .page(METHOD_RESOURCES_TEMPLATES_LIST, cursor, ctx)
                .await?;
            Ok((resp.resource_templates, resp.next_cursor))
        })
    }

    /// Read the contents of a resource by URI.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::InvalidArgument`] when `uri` is blank; otherwise
    /// propagates session errors.
    pub async fn read_resource(
        &self,
        uri: &str,
        ctx: &CancellationToken,
    ) -> Result<Vec<ResourceContents>> {
        require_non_blank("resource uri", uri)?;
        let params = serde_json::to_value(ResourceParams {
            uri: uri.to_string(),
        })?;
        let resp: ReadResourceResult = self
            .session
            .send_request(METHOD_RESOURCES_READ, Some(params), ctx)
            .await?;
        Ok(resp.contents)
    }

    /// Subscribe to change notifications for a resource URI.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::InvalidArgument`] when `uri` is blank; otherwise
    /// propagates session errors.
    pub async fn subscribe_resource(&self, uri: &str, ctx: &CancellationToken) -> Result<()> {
        require_non_blank("resource uri", uri)?;
        let params = serde_json::to_value(ResourceParams {
            uri: uri.to_string(),
        })?;
        let _: Value = self
            .session
            .send_request(METHOD_RESOURCES_SUBSCRIBE, Some(params), ctx)
            .await?;
        Ok(())
    }

    /// Unsubscribe from change notifications for a resource URI.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::InvalidArgument`] when `uri` is blank; otherwise
    /// propagates session errors.
    pub async fn unsubscribe_resource(&self, uri: &str, ctx: &CancellationToken) -> Result<()> {
        require_non_blank("resource uri", uri)?;
        let params = serde_json::to_value(ResourceParams {
            uri: uri.to_string(),
        })?;
        let _: Value = self
            .session
            .send_request(METHOD_RESOURCES_UNSUBSCRIBE, Some(params), ctx)
            .await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Completion and logging
    // -----------------------------------------------------------------------

    /// Request argument completions for a prompt or resource template.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::InvalidArgument`] when the reference fails
    /// validation or `argument_name` is blank; otherwise propagates session
    /// errors.
    pub async fn complete(
        &self,
        reference: CompletionReference,
        argument_name: &str,
        argument_value: &str,
        ctx: &CancellationToken,
    ) -> Result<Completion> {
        reference.validate()?;
        require_non_blank("argument name", argument_name)?;
        let params = serde_json::to_value(CompleteParams {
            reference,
            argument: CompleteArgument {
                name: argument_name.to_string(),
                value: argument_value.to_string(),
            },
        })?;
        let resp: CompleteResult = self
            .session
            .send_request(METHOD_COMPLETION_COMPLETE, Some(params), ctx)
            .await?;
        Ok(resp.completion)
    }

    /// Set the minimum severity the server should emit.
    ///
    /// Accepts either an MCP [`LoggingLevel`] or the generic
    /// [`crate::types::Severity`] enum, which is mapped by a fixed table.
    ///
    /// # Errors
    ///
    /// Propagates session errors.
    pub async fn set_logging_level(
        &self,
        level: impl Into<LoggingLevel>,
        ctx: &CancellationToken,
    ) -> Result<()> {
        let params = serde_json::to_value(SetLevelParams {
            level: level.into(),
        })?;
        let _: Value = self
            .session
            .send_request(METHOD_LOGGING_SET_LEVEL, Some(params), ctx)
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
