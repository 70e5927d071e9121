//! Stdio transport for MCP child-process servers
//!
//! This module implements [`StdioTransport`], which spawns a child process
//! and communicates with it over its stdin/stdout pipes using
//! newline-delimited JSON framing. This is the standard transport for
//! locally-installed MCP servers.
//!
//! # Protocol
//!
//! - Outbound messages are written to the child's stdin as a single JSON
//!   object followed by a newline (`\n`), UTF-8, no BOM. The write is
//!   flushed before `send` returns, so call order equals wire order.
//! - Inbound messages are read from the child's stdout one line at a time
//!   with a bounded line length ([`StdioOptions::max_line_len`], default
//!   1 MiB). An over-long or undecodable line is logged and skipped; a
//!   partial line at EOF is discarded.
//! - The child's stderr is diagnostic only and is forwarded line-by-line to
//!   `tracing::debug!`. Per the MCP spec it MUST NOT be treated as an error
//!   condition.
//!
//! # Lifecycle
//!
//! [`StdioTransport::spawn`] starts the child and the background reader
//! tasks; the transport is `Connected` as soon as `spawn` returns. A waiter
//! task reaps the child: if the process exits on its own, the transport
//! flips to `Closed` and later sends fail with
//! [`McpError::NotConnected`] carrying the exit status. [`Transport::close`]
//! closes stdin, asks the child to terminate, waits up to
//! [`StdioOptions::shutdown_timeout`], then kills it. Dropping the transport
//! sends a best-effort SIGTERM.

use std::collections::HashMap;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use futures::Stream;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command};
use tokio::sync::{mpsc, Mutex};
use tokio_stream::StreamExt;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;

use crate::error::{McpError, Result};
use crate::message::{self, Message};
use crate::transport::{channel_stream, StateCell, Transport, TransportState};

/// Default grace period between asking the child to terminate and killing it.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Default maximum accepted line length (1 MiB).
pub const DEFAULT_MAX_LINE_LEN: usize = 1024 * 1024;

/// Configuration for spawning a stdio MCP server subprocess.
///
/// # Examples
///
/// ```
/// use mcpkit::transport::stdio::StdioOptions;
///
/// let opts = StdioOptions::new("/usr/bin/env")
///     .arg("mcp-server")
///     .env("MCP_MODE", "stdio");
/// assert_eq!(opts.args, vec!["mcp-server"]);
/// ```
#[derive(Debug, Clone)]
pub struct StdioOptions {
    /// Path to the server executable.
    pub program: PathBuf,
    /// Command-line arguments passed to the executable.
    pub args: Vec<String>,
    /// Environment for the child. The inherited environment is cleared
    /// before these are applied.
    pub env: HashMap<String, String>,
    /// Optional working directory for the child process.
    pub cwd: Option<PathBuf>,
    /// Grace period before the child is forcibly killed on `close`.
    pub shutdown_timeout: Duration,
    /// Maximum accepted inbound line length; longer lines are skipped.
    pub max_line_len: usize,
}

impl StdioOptions {
    /// Create options for `program` with the defaults: no arguments, empty
    /// environment, inherited working directory, a 5 s shutdown timeout, and
    /// a 1 MiB line limit.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }

    /// Append one command-line argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set one environment variable for the child.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the child's working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Override the shutdown grace period.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Override the maximum accepted inbound line length.
    pub fn max_line_len(mut self, len: usize) -> Self {
        self.max_line_len = len;
        self
    }
}

/// Stdio-based MCP transport that supervises a child process.
///
/// # Examples
///
/// ```no_run
/// use mcpkit::transport::stdio::{StdioOptions, StdioTransport};
///
/// # fn main() -> anyhow::Result<()> {
/// let transport = StdioTransport::spawn(
///     StdioOptions::new("npx")
///         .arg("-y")
///         .arg("@modelcontextprotocol/server-filesystem")
///         .arg("/tmp"),
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct StdioTransport {
    /// Child stdin, serialized behind a mutex; `None` once closed.
    stdin: Arc<Mutex<Option<ChildStdin>>>,
    /// Shared receiver for decoded inbound messages.
    incoming_rx: Arc<Mutex<mpsc::UnboundedReceiver<Message>>>,
    /// Lifecycle state observable through `is_connected`.
    state: Arc<StateCell>,
    /// Exit status recorded by the waiter task once the child is reaped.
    exit_status: Arc<OnceLock<ExitStatus>>,
    /// Cancelled by the waiter task when the child has been reaped.
    exited: CancellationToken,
    /// Tells the waiter task to force-kill the child.
    kill_tx: mpsc::UnboundedSender<()>,
    /// Child PID, used for signal delivery without locking.
    pid: Option<u32>,
    shutdown_timeout: Duration,
}

impl StdioTransport {
    /// Spawn the server subprocess and wire up its stdio pipes.
    ///
    /// The child's environment is built by clearing all inherited variables
    /// and applying [`StdioOptions::env`]. Three background tasks start
    /// immediately: a stdout reader (bounded line framing, JSON decode), a
    /// stderr reader (diagnostics to `tracing`), and a waiter that reaps the
    /// child and records its exit status.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::NotConnected`] if the process cannot be spawned
    /// or a stdio pipe is unavailable; the OS error is included in the
    /// message.
    pub fn spawn(options: StdioOptions) -> Result<Self> {
        let mut cmd = Command::new(&options.program);
        cmd.args(&options.args);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.env_clear().envs(&options.env);
        if let Some(dir) = &options.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            McpError::NotConnected(format!(
                "failed to spawn MCP server `{}`: {}",
                options.program.display(),
                e
            ))
        })?;

        // All three handles are guaranteed present because of Stdio::piped().
        let stdin = child.stdin.take().ok_or_else(|| {
            McpError::NotConnected("child stdin unavailable after spawn".to_string())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            McpError::NotConnected("child stdout unavailable after spawn".to_string())
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            McpError::NotConnected("child stderr unavailable after spawn".to_string())
        })?;

        let pid = child.id();
        let state = Arc::new(StateCell::new(TransportState::Connected));
        let exit_status = Arc::new(OnceLock::new());
        let exited = CancellationToken::new();
        let (kill_tx, mut kill_rx) = mpsc::unbounded_channel::<()>();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel::<Message>();

        // Background task: decode child stdout line-by-line.
        let max_line_len = options.max_line_len;
        tokio::spawn(async move {
            let mut lines =
                FramedRead::new(stdout, LinesCodec::new_with_max_length(max_line_len));
            while let Some(item) = lines.next().await {
                match item {
                    Ok(line) => match message::decode(&line) {
                        Ok(msg) => {
                            if incoming_tx.send(msg).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(
                                target: "mcpkit::transport::stdio",
                                "dropping undecodable frame: {e}"
                            );
                        }
                    },
                    Err(LinesCodecError::MaxLineLengthExceeded) => {
                        tracing::warn!(
                            target: "mcpkit::transport::stdio",
                            "dropping over-long line (limit {max_line_len} bytes)"
                        );
                    }
                    Err(LinesCodecError::Io(e)) => {
                        tracing::warn!(
                            target: "mcpkit::transport::stdio",
                            "stdout read error: {e}"
                        );
                        break;
                    }
                }
            }
            // incoming_tx drops here: end-of-stream for the session.
        });

        // Background task: forward child stderr to the logger.
        tokio::spawn(async move {
            let reader = BufReader::new(stderr);
            let mut lines = reader.lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!(
                    target: "mcpkit::transport::stdio",
                    "mcp server stderr: {}",
                    line
                );
            }
        });

        // Background task: reap the child and record its exit status.
        let waiter_state = Arc::clone(&state);
        let waiter_status = Arc::clone(&exit_status);
        let waiter_exited = exited.clone();
        tokio::spawn(async move {
            let outcome = loop {
                tokio::select! {
                    outcome = child.wait() => break outcome,
                    request = kill_rx.recv() => {
                        if request.is_some() {
                            let _ = child.start_kill();
                        } else {
                            break child.wait().await;
                        }
                    }
                }
            };
            match outcome {
                Ok(status) => {
                    let _ = waiter_status.set(status);
                    tracing::debug!(
                        target: "mcpkit::transport::stdio",
                        "mcp server exited with {status}"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        target: "mcpkit::transport::stdio",
                        "failed to reap mcp server: {e}"
                    );
                }
            }
            waiter_state.store(TransportState::Closed);
            waiter_exited.cancel();
        });

        Ok(Self {
            stdin: Arc::new(Mutex::new(Some(stdin))),
            incoming_rx: Arc::new(Mutex::new(incoming_rx)),
            state,
            exit_status,
            exited,
            kill_tx,
            pid,
            shutdown_timeout: options.shutdown_timeout,
        })
    }

    /// Human-readable cause used for `NotConnected` errors.
    fn disconnect_cause(&self) -> String {
        match self.exit_status.get() {
            Some(status) => format!("process exited with {status}"),
            None => match self.state.load() {
                TransportState::Closing | TransportState::Closed => {
                    "transport disposed".to_string()
                }
                _ => "transport not running".to_string(),
            },
        }
    }

    #[cfg(unix)]
    fn send_sigterm(&self) {
        if let Some(pid) = self.pid {
            // SAFETY: pid was obtained from tokio::process::Child for a
            // process this transport owns.
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
        }
    }
}

#[async_trait::async_trait]
impl Transport for StdioTransport {
    /// Write one message to the child's stdin as a single newline-terminated
    /// JSON line, flushing before returning.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::NotConnected`] when the child has exited (the
    /// exit status is included) or the transport was disposed.
    async fn send(&self, message: &Message) -> Result<()> {
        if self.state.load() != TransportState::Connected {
            return Err(McpError::NotConnected(self.disconnect_cause()).into());
        }

        let mut line = message::encode(message)?;
        line.push('\n');

        let mut guard = self.stdin.lock().await;
        let stdin = guard
            .as_mut()
            .ok_or_else(|| McpError::NotConnected(self.disconnect_cause()))?;

        if let Err(e) = stdin.write_all(line.as_bytes()).await {
            return Err(
                McpError::NotConnected(format!("stdin write failed: {e}")).into()
            );
        }
        if let Err(e) = stdin.flush().await {
            return Err(
                McpError::NotConnected(format!("stdin flush failed: {e}")).into()
            );
        }
        Ok(())
    }

    /// Returns the stream of decoded messages from the child's stdout.
    fn incoming(&self) -> Pin<Box<dyn Stream<Item = Message> + Send + '_>> {
        channel_stream(Arc::clone(&self.incoming_rx))
    }

    fn is_connected(&self) -> bool {
        self.state.load() == TransportState::Connected
    }

    /// Shut the child down: close stdin, request termination, wait up to the
    /// configured grace period, then force-kill. Idempotent.
    async fn close(&self) -> Result<()> {
        match self.state.load() {
            TransportState::Closed => return Ok(()),
            TransportState::Closing => {
                self.exited.cancelled().await;
                return Ok(());
            }
            _ => {}
        }
        self.state.store(TransportState::Closing);

        // Closing stdin is the polite shutdown request for stdio servers.
        self.stdin.lock().await.take();
        #[cfg(unix)]
        self.send_sigterm();

        let grace = tokio::time::timeout(self.shutdown_timeout, self.exited.cancelled()).await;
        if grace.is_err() {
            let _ = self.kill_tx.send(());
            self.exited.cancelled().await;
        }
        self.state.store(TransportState::Closed);
        Ok(())
    }
}

impl Drop for StdioTransport {
    /// Best-effort termination of the child process on drop.
    ///
    /// Must not block: sends SIGTERM on Unix, or a kill request to the
    /// waiter task elsewhere. The waiter reaps the child either way.
    fn drop(&mut self) {
        if self.exit_status.get().is_some() {
            return;
        }
        #[cfg(unix)]
        self.send_sigterm();
        #[cfg(not(unix))]
        {
            let _ = self.kill_tx.send(());
        }
    }
}
