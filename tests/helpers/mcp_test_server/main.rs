//! MCP test server binary for integration tests
//!
//! This binary implements a minimal MCP server that communicates over
//! stdin/stdout using newline-delimited JSON (the stdio transport framing).
//! It is used exclusively by integration tests to exercise the stdio
//! transport and session without requiring a real external MCP server.
//!
//! # Handled Methods
//!
//! - `ping` -- responds with an empty result object.
//! - `tools/list` -- two pages: the first returns `echo` and `slow_echo`
//!   with `nextCursor: "page2"`, the second (cursor `"page2"`) returns
//!   `reverse` with no cursor.
//! - `tools/call` with `name: "echo"` -- echoes back the `message`
//!   argument. When the request carries `_meta.progressToken`, three
//!   `notifications/progress` are emitted before the response.
//! - All other methods -- a JSON-RPC `-32601 Method not found` error.
//!
//! # Usage
//!
//! The binary reads from stdin and writes to stdout. Each line of stdin is
//! one JSON-RPC message; each response is a single line of JSON followed by
//! `\n`. Pass `--exit` to terminate immediately with status 7 (used to test
//! subprocess-exit handling).

use std::io::{self, BufRead, Write};

fn main() {
    if std::env::args().any(|arg| arg == "--exit") {
        std::process::exit(7);
    }

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let request: serde_json::Value = match serde_json::from_str(trimmed) {
            Ok(v) => v,
            Err(_) => {
                let response = serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": null,
                    "error": {
                        "code": -32700,
                        "message": "Parse error"
                    }
                });
                let _ = writeln!(out, "{}", response);
                let _ = out.flush();
                continue;
            }
        };

        let method = request.get("method").and_then(|m| m.as_str()).unwrap_or("");
        let id = request
            .get("id")
            .cloned()
            .unwrap_or(serde_json::Value::Null);

        // Notifications get no response.
        if id.is_null() {
            continue;
        }

        let response = match method {
            "ping" => handle_ping(&id),
            "tools/list" => handle_tools_list(&id, &request),
            "tools/call" => handle_tools_call(&id, &request, &mut out),
            other => make_error(&id, -32601, &format!("Method not found: {}", other)),
        };

        if writeln!(out, "{}", response).is_err() {
            break;
        }
        if out.flush().is_err() {
            break;
        }
    }
}

/// Handle the `ping` request with an empty result object.
fn handle_ping(id: &serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": {}
    })
}

/// Handle the `tools/list` request: two pages joined by cursor `"page2"`.
fn handle_tools_list(
    id: &serde_json::Value,
    request: &serde_json::Value,
) -> serde_json::Value {
    let cursor = request
        .get("params")
        .and_then(|p| p.get("cursor"))
        .and_then(|c| c.as_str());

    match cursor {
        None => serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {
                "tools": [
                    {
                        "name": "echo",
                        "description": "Echoes input",
                        "inputSchema": {
                            "type": "object",
                            "properties": { "message": { "type": "string" } }
                        }
                    },
                    {
                        "name": "slow_echo",
                        "description": "Echoes input after a delay",
                        "inputSchema": { "type": "object" }
                    }
                ],
                "nextCursor": "page2"
            }
        }),
        Some("page2") => serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {
                "tools": [
                    {
                        "name": "reverse",
                        "description": "Reverses input",
                        "inputSchema": { "type": "object" }
                    }
                ]
            }
        }),
        Some(other) => make_error(id, -32602, &format!("Unknown cursor: {}", other)),
    }
}

/// Handle the `tools/call` request.
///
/// `echo` returns `arguments.message` as text content; when the request
/// carries `_meta.progressToken`, three progress notifications precede the
/// response. Unknown tool names get a JSON-RPC error.
fn handle_tools_call(
    id: &serde_json::Value,
    request: &serde_json::Value,
    out: &mut impl Write,
) -> serde_json::Value {
    let params = request.get("params").cloned().unwrap_or(serde_json::Value::Null);
    let tool_name = params.get("name").and_then(|n| n.as_str()).unwrap_or("");

    if tool_name != "echo" {
        return make_error(id, -32602, &format!("Unknown tool: {}", tool_name));
    }

    if let Some(token) = params.get("_meta").and_then(|m| m.get("progressToken")) {
        for step in 1..=3 {
            let progress = serde_json::json!({
                "jsonrpc": "2.0",
                "method": "notifications/progress",
                "params": {
                    "progressToken": token,
                    "progress": step as f64,
                    "total": 3.0
                }
            });
            let _ = writeln!(out, "{}", progress);
            let _ = out.flush();
        }
    }

    let message = params
        .get("arguments")
        .and_then(|a| a.get("message"))
        .and_then(|m| m.as_str())
        .unwrap_or("");

    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": {
            "content": [
                { "type": "text", "text": message }
            ],
            "isError": false
        }
    })
}

/// Build a JSON-RPC error response.
fn make_error(id: &serde_json::Value, code: i32, message: &str) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": code,
            "message": message
        }
    })
}
