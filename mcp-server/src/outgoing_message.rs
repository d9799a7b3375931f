use mcp_types::JSONRPC_VERSION;
use mcp_types::JSONRPCError;
use mcp_types::JSONRPCErrorError;
use mcp_types::JSONRPCMessage;
use mcp_types::JSONRPCResponse;
use mcp_types::RequestId;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::error;
use tracing::warn;

/// Cloneable handle used by the processor and by in-flight tool calls to
/// queue messages for the stdout writer.
#[derive(Clone, Debug)]
pub(crate) struct OutgoingMessageSender {
    sender: mpsc::UnboundedSender<JSONRPCMessage>,
}

impl OutgoingMessageSender {
    pub(crate) fn new(sender: mpsc::UnboundedSender<JSONRPCMessage>) -> Self {
        Self { sender }
    }

    pub(crate) fn send_response<T: Serialize>(&self, id: RequestId, response: T) {
        match serde_json::to_value(response) {
            Ok(result) => self.send(JSONRPCMessage::Response(JSONRPCResponse {
                jsonrpc: JSONRPC_VERSION.to_string(),
                id,
                result,
            })),
            Err(err) => {
                error!(error = %err, "failed to serialize response");
                self.send_error(
                    id,
                    JSONRPCErrorError {
                        code: mcp_types::INTERNAL_ERROR_CODE,
                        message: format!("failed to serialize response: {err}"),
                        data: None,
                    },
                );
            }
        }
    }

    pub(crate) fn send_error(&self, id: RequestId, error: JSONRPCErrorError) {
        self.send(JSONRPCMessage::Error(JSONRPCError {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            error,
        }));
    }

    fn send(&self, message: JSONRPCMessage) {
        if self.sender.send(message).is_err() {
            warn!("stdout writer has shut down; dropping outgoing message");
        }
    }
}

pub(crate) fn error_payload(code: i64, message: impl Into<String>) -> JSONRPCErrorError {
    JSONRPCErrorError {
        code,
        message: message.into(),
        data: None,
    }
}
