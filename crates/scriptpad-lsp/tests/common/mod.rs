//! Common test utilities for integration tests.
//!
//! Provides `LspClient`, which drives the server binary over stdio.

use serde_json::{Value, json};
use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, Command, Stdio};

/// LSP test client for communicating with the server binary.
pub(crate) struct LspClient {
    process: Child,
    /// Notifications read while waiting for something else.
    notifications: Vec<Value>,
    reader: BufReader<std::process::ChildStdout>,
}

impl LspClient {
    /// Spawn the scriptpad-lsp binary.
    pub(crate) fn spawn() -> Self {
        let mut process = Command::new(env!("CARGO_BIN_EXE_scriptpad-lsp"))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("Failed to spawn scriptpad-lsp binary");

        let stdout = process.stdout.take().expect("Failed to capture stdout");

        Self {
            process,
            notifications: Vec::new(),
            reader: BufReader::new(stdout),
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

    /// Read one framed message.
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

    /// Read until the response with `expected_id`, keeping notifications.
    pub(crate) fn read_response(&mut self, expected_id: i64) -> Value {
        loop {
            let message = self.read_message();
            if message.get("id").is_none() {
                self.notifications.push(message);
                continue;
            }
            if message.get("id") == Some(&json!(expected_id)) {
                return message;
            }
        }
    }

    /// Returns the first notification of `method` whose params satisfy
    /// `matches`, reading from the server until one arrives.
    pub(crate) fn wait_for_notification(
        &mut self,
        method: &str,
        matches: impl Fn(&Value) -> bool,
    ) -> Value {
        let is_match = |message: &Value| {
            message.get("method").and_then(Value::as_str) == Some(method)
                && matches(&message["params"])
        };

        if let Some(pos) = self.notifications.iter().position(|m| is_match(m)) {
            return self.notifications.remove(pos)["params"].clone();
        }
        loop {
            let message = self.read_message();
            if is_match(&message) {
                return message["params"].clone();
            }
            if message.get("id").is_none() {
                self.notifications.push(message);
            }
        }
    }

    /// Initialize the LSP session.
    pub(crate) fn initialize(&mut self, options: Value) -> Value {
        self.send(&json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "processId": null,
                "capabilities": {
                    "textDocument": {
                        "completion": {
                            "completionItem": {
                                "snippetSupport": false
                            }
                        },
                        "publishDiagnostics": {}
                    }
                },
                "initializationOptions": options,
                "rootUri": "file:///tmp",
                "workspaceFolders": null
            }
        }));

        let response = self.read_response(1);

        self.send(&json!({
            "jsonrpc": "2.0",
            "method": "initialized",
            "params": {}
        }));

        response
    }

    /// Open a text document.
    pub(crate) fn did_open(&mut self, uri: &str, text: &str) {
        self.send(&json!({
            "jsonrpc": "2.0",
            "method": "textDocument/didOpen",
            "params": {
                "textDocument": {
                    "uri": uri,
                    "languageId": "scriptpad",
                    "version": 1,
                    "text": text
                }
            }
        }));
    }

    /// Apply one incremental edit.
    pub(crate) fn did_change(
        &mut self,
        uri: &str,
        version: i32,
        start: (u32, u32),
        end: (u32, u32),
        text: &str,
    ) {
        self.send(&json!({
            "jsonrpc": "2.0",
            "method": "textDocument/didChange",
            "params": {
                "textDocument": { "uri": uri, "version": version },
                "contentChanges": [{
                    "range": {
                        "start": { "line": start.0, "character": start.1 },
                        "end": { "line": end.0, "character": end.1 }
                    },
                    "text": text
                }]
            }
        }));
    }

    /// Request completions.
    pub(crate) fn completion(&mut self, id: i64, uri: &str, line: u32, character: u32) -> Value {
        self.send(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "textDocument/completion",
            "params": {
                "textDocument": {"uri": uri},
                "position": {"line": line, "character": character}
            }
        }));
        self.read_response(id)
    }

    /// Request whole-document formatting.
    pub(crate) fn formatting(&mut self, id: i64, uri: &str) -> Value {
        self.send(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "textDocument/formatting",
            "params": {
                "textDocument": {"uri": uri},
                "options": {"tabSize": 4, "insertSpaces": true}
            }
        }));
        self.read_response(id)
    }

    /// Request pull diagnostics.
    pub(crate) fn diagnostic(&mut self, id: i64, uri: &str) -> Value {
        self.send(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "textDocument/diagnostic",
            "params": {
                "textDocument": {"uri": uri}
            }
        }));
        self.read_response(id)
    }

    /// Run a workspace command.
    pub(crate) fn execute_command(&mut self, id: i64, command: &str, arguments: Value) -> Value {
        self.send(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "workspace/executeCommand",
            "params": {
                "command": command,
                "arguments": arguments
            }
        }));
        self.read_response(id)
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
