use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use assert_cmd::prelude::*;
use mcp_types::JSONRPC_VERSION;
use mcp_types::JSONRPCMessage;
use mcp_types::JSONRPCNotification;
use mcp_types::JSONRPCRequest;
use mcp_types::RequestId;
use serde_json::Value;
use serde_json::json;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::io::Lines;
use tokio::process::Child;
use tokio::process::ChildStdin;
use tokio::process::ChildStdout;
use tokio::process::Command;

pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(20);

/// A running `copilot-mcp-server` driven over its stdio.
pub struct McpProcess {
    next_request_id: i64,
    process: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl McpProcess {
    pub async fn new(home: &Path, copilot_bin: &Path) -> anyhow::Result<Self> {
        let std_cmd = std::process::Command::cargo_bin("copilot-mcp-server")
            .context("should find binary for copilot-mcp-server")?;
        let mut cmd = Command::from(std_cmd);
        cmd.arg("--home")
            .arg(home)
            .arg("--copilot-bin")
            .arg(copilot_bin)
            .env("RUST_LOG", "debug")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut process = cmd.spawn().context("copilot-mcp-server should start")?;
        let stdin = process.stdin.take().context("stdin should be piped")?;
        let stdout = process.stdout.take().context("stdout should be piped")?;
        Ok(Self {
            next_request_id: 0,
            process,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        })
    }

    /// Performs the `initialize` handshake and returns the server's result.
    pub async fn initialize(&mut self) -> anyhow::Result<Value> {
        let id = self
            .send_request(
                "initialize",
                Some(json!({
                    "protocolVersion": mcp_types::MCP_SCHEMA_VERSION,
                    "capabilities": {},
                    "clientInfo": { "name": "mcp-test-client", "version": "0.0.0" },
                })),
            )
            .await?;
        let result = self.read_response(id).await?;
        self.send_notification("notifications/initialized").await?;
        Ok(result)
    }

    pub async fn send_request(
        &mut self,
        method: &str,
        params: Option<Value>,
    ) -> anyhow::Result<RequestId> {
        self.next_request_id += 1;
        let id = RequestId::Integer(self.next_request_id);
        self.send(JSONRPCMessage::Request(JSONRPCRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.clone(),
            method: method.to_string(),
            params,
        }))
        .await?;
        Ok(id)
    }

    pub async fn send_notification(&mut self, method: &str) -> anyhow::Result<()> {
        self.send(JSONRPCMessage::Notification(JSONRPCNotification {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            params: None,
        }))
        .await
    }

    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> anyhow::Result<Value> {
        let id = self
            .send_request(
                "tools/call",
                Some(json!({ "name": name, "arguments": arguments })),
            )
            .await?;
        self.read_response(id).await
    }

    /// Reads until the response (or error) for `id` arrives. Errors are
    /// returned as `{"error": {...}}` so tests can assert on them.
    pub async fn read_response(&mut self, id: RequestId) -> anyhow::Result<Value> {
        loop {
            let message = self.read_message().await?;
            match message {
                JSONRPCMessage::Response(response) if response.id == id => {
                    return Ok(response.result);
                }
                JSONRPCMessage::Error(error) if error.id == id => {
                    return Ok(json!({ "error": error.error }));
                }
                _ => continue,
            }
        }
    }

    async fn read_message(&mut self) -> anyhow::Result<JSONRPCMessage> {
        let line = tokio::time::timeout(DEFAULT_READ_TIMEOUT, self.stdout.next_line())
            .await
            .context("timed out waiting for the server")??
            .context("server closed stdout")?;
        serde_json::from_str(&line).with_context(|| format!("invalid message: {line}"))
    }

    async fn send(&mut self, message: JSONRPCMessage) -> anyhow::Result<()> {
        let mut line = serde_json::to_string(&message)?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// Closes stdin and waits for the server to exit on its own.
    pub async fn shutdown(mut self) -> anyhow::Result<std::process::ExitStatus> {
        drop(self.stdin);
        let status = tokio::time::timeout(DEFAULT_READ_TIMEOUT, self.process.wait())
            .await
            .context("server did not exit after stdin closed")??;
        Ok(status)
    }
}

/// Writes `copilot-mcp.toml` with short delays so tests finish quickly.
pub fn write_fast_config(home: &Path) -> std::io::Result<()> {
    std::fs::write(
        home.join("copilot-mcp.toml"),
        r#"startup_delay_ms = 50
response_wait_ms = 300
command_timeout_ms = 5000
version_check_timeout_ms = 3000
"#,
    )
}
