//! Common test utilities for integration tests.
//!
//! This module provides the `LspClient`, which drives the server binary over
//! stdio with Content-Length framed JSON-RPC messages.

use serde_json::{Value, json};
use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

/// A notification sent by the server.
#[derive(Debug, Clone)]
pub(crate) struct CapturedNotification {
    pub method: String,
    pub params: Value,
}

/// LSP test client for communicating with the server binary.
pub(crate) struct LspClient {
    process: Child,
    /// Captured notifications in order received.
    notifications: Vec<CapturedNotification>,
    reader: BufReader<std::process::ChildStdout>,
    next_flush_id: i64,
}

impl LspClient {
    /// Spawn the ddpls binary.
    pub(crate) fn spawn() -> Self {
        let mut process = Command::new(env!("CARGO_BIN_EXE_ddpls"))
            .env("RUST_LOG", "warn")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("Failed to spawn ddpls binary");

        let stdout = process.stdout.take().expect("Failed to capture stdout");

        Self {
            process,
            notifications: Vec::new(),
            reader: BufReader::new(stdout),
            next_flush_id: 10_000,
        }
    }

    /// Send a JSON-RPC message to the server.
    pub(crate) fn send(&mut self, message: &Value) {
        let body = serde_json::to_string(message).unwrap();
        let header = format!("Content-Length: {}\r\n\r\n", body.len());

        let stdin = self.process.stdin.as_mut().expect("stdin not captured");
        stdin.write_all(header.as_bytes()).unwrap();
        stdin.write_all(body.as_bytes()).unwrap();
        stdin.flush().unwrap();
    }

    /// Send a request and wait for its response.
    pub(crate) fn request(&mut self, id: i64, method: &str, params: Value) -> Value {
        self.send(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        }));
        self.read_response(id)
    }

    /// Send a notification.
    pub(crate) fn notify(&mut self, method: &str, params: Value) {
        self.send(&json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params
        }));
    }

    /// Read messages until the response with `expected_id` arrives,
    /// capturing notifications on the way.
    pub(crate) fn read_response(&mut self, expected_id: i64) -> Value {
        loop {
            let message = self.read_message();

            if message.get("id").is_none() {
                if let Some(method) = message.get("method").and_then(|m| m.as_str()) {
                    self.notifications.push(CapturedNotification {
                        method: method.to_string(),
                        params: message.get("params").cloned().unwrap_or(Value::Null),
                    });
                }
                continue;
            }

            // Requests from the server carry a method; answer them so it
            // does not wait on us.
            if message.get("method").is_some() {
                let id = message["id"].clone();
                self.send(&json!({ "jsonrpc": "2.0", "id": id, "result": null }));
                continue;
            }

            if message.get("id") == Some(&json!(expected_id)) {
                return message;
            }
        }
    }

    fn read_message(&mut self) -> Value {
        let mut content_length = 0;
        loop {
            let mut line = String::new();
            let bytes_read = self
                .reader
                .read_line(&mut line)
                .expect("Failed to read header");

            // EOF - server closed connection
            assert!(bytes_read != 0, "Server closed connection unexpectedly");

            if line == "\r\n" || line == "\n" {
                break;
            }

            if line.to_lowercase().starts_with("content-length:") {
                content_length = line
                    .split(':')
                    .nth(1)
                    .unwrap()
                    .trim()
                    .parse()
                    .expect("Invalid content length");
            }
        }

        let mut body = vec![0u8; content_length];
        self.reader
            .read_exact(&mut body)
            .expect("Failed to read body");

        serde_json::from_slice(&body).unwrap_or_else(|e| {
            panic!("Invalid JSON: {e} in: {:?}", String::from_utf8_lossy(&body))
        })
    }

    /// Waits until a notification matching `predicate` has been captured.
    ///
    /// Notifications only arrive while a response is read, so this keeps
    /// sending cheap requests until one shows up or the attempts run out.
    pub(crate) fn wait_for_notification(
        &mut self,
        method: &str,
        predicate: impl Fn(&Value) -> bool,
    ) -> Option<Value> {
        for _ in 0..40 {
            if let Some(found) = self
                .notifications
                .iter()
                .find(|n| n.method == method && predicate(&n.params))
            {
                return Some(found.params.clone());
            }
            thread::sleep(Duration::from_millis(50));
            let id = self.next_flush_id;
            self.next_flush_id += 1;
            // Unsupported by the server; answered with an error right away.
            self.request(id, "workspace/symbol", json!({ "query": "" }));
        }
        None
    }

    /// Initialize the LSP session.
    pub(crate) fn initialize(&mut self) -> Value {
        let response = self.request(
            1,
            "initialize",
            json!({
                "processId": null,
                "capabilities": {
                    "textDocument": {
                        "hover": {
                            "contentFormat": ["markdown", "plaintext"]
                        },
                        "completion": {
                            "completionItem": {
                                "snippetSupport": true
                            }
                        },
                        "publishDiagnostics": {}
                    }
                },
                "initializationOptions": {
                    "diagnostics": { "debounce_ms": 50 }
                },
                "rootUri": "file:///tmp",
                "workspaceFolders": null
            }),
        );

        self.notify("initialized", json!({}));

        response
    }

    /// Open a text document.
    pub(crate) fn did_open(&mut self, uri: &str, text: &str) {
        self.notify(
            "textDocument/didOpen",
            json!({
                "textDocument": {
                    "uri": uri,
                    "languageId": "ddp",
                    "version": 1,
                    "text": text
                }
            }),
        );
    }

    /// Replace the whole text of a document.
    pub(crate) fn did_change(&mut self, uri: &str, version: i32, text: &str) {
        self.notify(
            "textDocument/didChange",
            json!({
                "textDocument": { "uri": uri, "version": version },
                "contentChanges": [{ "text": text }]
            }),
        );
    }

    pub(crate) fn did_close(&mut self, uri: &str) {
        self.notify(
            "textDocument/didClose",
            json!({ "textDocument": { "uri": uri } }),
        );
    }

    /// Send a request positioned in a document.
    pub(crate) fn position_request(
        &mut self,
        id: i64,
        method: &str,
        uri: &str,
        line: u32,
        character: u32,
    ) -> Value {
        self.request(
            id,
            method,
            json!({
                "textDocument": {"uri": uri},
                "position": {"line": line, "character": character}
            }),
        )
    }

    /// Shutdown the server.
    pub(crate) fn shutdown(&mut self) -> Value {
        self.send(&json!({
            "jsonrpc": "2.0",
            "id": 999,
            "method": "shutdown"
        }));
        self.read_response(999)
    }
}

impl Drop for LspClient {
    fn drop(&mut self) {
        let _ = self.process.kill();
    }
}


