//! mcpkit - client-side Model Context Protocol core
//!
//! This library provides the protocol core of an MCP client: the session
//! layer that multiplexes JSON-RPC 2.0 traffic over a pluggable transport,
//! request/response correlation, the progress and cancellation
//! subprotocols, transparent pagination, a typed client façade, and a
//! bridge that serves server-initiated sampling requests from a streaming
//! chat provider.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `message`: JSON-RPC 2.0 message model and codec
//! - `transport`: the `Transport` trait plus the stdio subprocess and SSE
//!   server implementations
//! - `session`: correlation table, progress routing, cancellation, and
//!   inbound request dispatch
//! - `paginate`: cursor-loop driver turning paged RPCs into gather-all or
//!   lazy-stream form
//! - `client`: typed operation surface (tools, prompts, resources,
//!   completion, subscriptions, logging)
//! - `sampling`: `sampling/createMessage` over a streaming chat call
//! - `error`: error types and result alias
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mcpkit::client::Client;
//! use mcpkit::session::Session;
//! use mcpkit::transport::stdio::{StdioOptions, StdioTransport};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let transport = Arc::new(StdioTransport::spawn(
//!         StdioOptions::new("npx").arg("-y").arg("@modelcontextprotocol/server-everything"),
//!     )?);
//!     let client = Client::new(Session::connect(transport));
//!
//!     let ctx = CancellationToken::new();
//!     for tool in client.list_tools(&ctx).await? {
//!         println!("{}", tool.name);
//!     }
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod message;
pub mod paginate;
pub mod sampling;
pub mod session;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use client::{arguments, Arguments, Client};
pub use error::{McpError, Result};
pub use message::{Message, ProgressToken, RequestId};
pub use session::{Session, SessionOptions};
pub use transport::Transport;
