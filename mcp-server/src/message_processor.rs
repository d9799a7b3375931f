use std::sync::Arc;

use mcp_types::CallToolRequestParams;
use mcp_types::INTERNAL_ERROR_CODE;
use mcp_types::INVALID_PARAMS_ERROR_CODE;
use mcp_types::INVALID_REQUEST_ERROR_CODE;
use mcp_types::Implementation;
use mcp_types::InitializeRequestParams;
use mcp_types::InitializeResult;
use mcp_types::JSONRPCError;
use mcp_types::JSONRPCErrorError;
use mcp_types::JSONRPCNotification;
use mcp_types::JSONRPCRequest;
use mcp_types::JSONRPCResponse;
use mcp_types::ListResourceTemplatesResult;
use mcp_types::ListResourcesResult;
use mcp_types::ListToolsResult;
use mcp_types::MCP_SCHEMA_VERSION;
use mcp_types::METHOD_NOT_FOUND_ERROR_CODE;
use mcp_types::ReadResourceRequestParams;
use mcp_types::RequestId;
use mcp_types::ServerCapabilities;
use mcp_types::ServerCapabilitiesResources;
use mcp_types::ServerCapabilitiesTools;
use mcp_types::methods;
use serde::de::DeserializeOwned;
use serde_json::Value;
use serde_json::json;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::outgoing_message::OutgoingMessageSender;
use crate::outgoing_message::error_payload;
use crate::resources;
use crate::resources::ResourceError;
use crate::tool_registry::ToolRegistry;

pub const SERVER_NAME: &str = "copilot-mcp-server";

pub(crate) struct MessageProcessor {
    outgoing: OutgoingMessageSender,
    tools: Arc<ToolRegistry>,
    initialized: bool,
}

impl MessageProcessor {
    pub(crate) fn new(outgoing: OutgoingMessageSender, tools: Arc<ToolRegistry>) -> Self {
        Self {
            outgoing,
            tools,
            initialized: false,
        }
    }

    pub(crate) fn process_request(&mut self, request: JSONRPCRequest) {
        let JSONRPCRequest {
            id, method, params, ..
        } = request;
        debug!(?id, method, "request received");

        match method.as_str() {
            methods::INITIALIZE => self.handle_initialize(id, params),
            methods::PING => self.outgoing.send_response(id, json!({})),
            methods::TOOLS_LIST => self.outgoing.send_response(
                id,
                ListToolsResult {
                    tools: self.tools.list(),
                    next_cursor: None,
                },
            ),
            methods::TOOLS_CALL => self.handle_call_tool(id, params),
            methods::RESOURCES_LIST => self.outgoing.send_response(
                id,
                ListResourcesResult {
                    resources: resources::list_resources(),
                },
            ),
            methods::RESOURCES_TEMPLATES_LIST => self.outgoing.send_response(
                id,
                ListResourceTemplatesResult {
                    resource_templates: resources::list_resource_templates(),
                },
            ),
            methods::RESOURCES_READ => self.handle_read_resource(id, params),
            other => self.outgoing.send_error(
                id,
                error_payload(METHOD_NOT_FOUND_ERROR_CODE, format!("Method not found: {other}")),
            ),
        }
    }

    pub(crate) fn process_notification(&self, notification: JSONRPCNotification) {
        debug!(method = notification.method, "ignoring notification");
    }

    pub(crate) fn process_response(&self, response: JSONRPCResponse) {
        debug!(id = ?response.id, "ignoring response; the server sends no requests");
    }

    pub(crate) fn process_error(&self, error: JSONRPCError) {
        warn!(id = ?error.id, message = error.error.message, "client reported an error");
    }

    fn handle_initialize(&mut self, id: RequestId, params: Option<Value>) {
        if self.initialized {
            self.outgoing.send_error(
                id,
                error_payload(INVALID_REQUEST_ERROR_CODE, "initialize called more than once"),
            );
            return;
        }

        let params: InitializeRequestParams = match params {
            Some(params) => match decode_params(params) {
                Ok(params) => params,
                Err(error) => {
                    self.outgoing.send_error(id, error);
                    return;
                }
            },
            None => InitializeRequestParams::default(),
        };
        if let Some(client) = &params.client_info {
            info!(client = client.name, version = client.version, "client connected");
        }

        self.initialized = true;
        self.outgoing.send_response(
            id,
            InitializeResult {
                protocol_version: params
                    .protocol_version
                    .unwrap_or_else(|| MCP_SCHEMA_VERSION.to_string()),
                capabilities: ServerCapabilities {
                    tools: Some(ServerCapabilitiesTools {
                        list_changed: Some(false),
                    }),
                    resources: Some(ServerCapabilitiesResources {
                        list_changed: Some(false),
                        subscribe: Some(false),
                    }),
                },
                server_info: Implementation {
                    name: SERVER_NAME.to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    title: Some("GitHub Copilot CLI".to_string()),
                },
                instructions: None,
            },
        );
    }

    /// Tool calls run on their own task so a slow CLI never blocks other
    /// requests.
    fn handle_call_tool(&self, id: RequestId, params: Option<Value>) {
        let params: CallToolRequestParams = match params.map(decode_params) {
            Some(Ok(params)) => params,
            Some(Err(error)) => {
                self.outgoing.send_error(id, error);
                return;
            }
            None => {
                self.outgoing.send_error(
                    id,
                    error_payload(INVALID_PARAMS_ERROR_CODE, "tools/call requires params"),
                );
                return;
            }
        };

        let outgoing = self.outgoing.clone();
        let tools = Arc::clone(&self.tools);
        tokio::spawn(async move {
            let CallToolRequestParams { name, arguments } = params;
            let result = tools.call(&name, arguments).await;
            outgoing.send_response(id, result);
        });
    }

    fn handle_read_resource(&self, id: RequestId, params: Option<Value>) {
        let params: ReadResourceRequestParams =
            match decode_params(params.unwrap_or(Value::Null)) {
                Ok(params) => params,
                Err(error) => {
                    self.outgoing.send_error(id, error);
                    return;
                }
            };

        match resources::read_resource(&params.uri, self.tools.context().sessions()) {
            Ok(result) => self.outgoing.send_response(id, result),
            Err(err) => {
                let code = match err {
                    ResourceError::UnknownUri(_) => INVALID_PARAMS_ERROR_CODE,
                    ResourceError::Session(_) | ResourceError::Encode(_) => INTERNAL_ERROR_CODE,
                };
                self.outgoing
                    .send_error(id, error_payload(code, err.to_string()));
            }
        }
    }
}

fn decode_params<P: DeserializeOwned>(params: Value) -> Result<P, JSONRPCErrorError> {
    serde_json::from_value(params)
        .map_err(|e| error_payload(INVALID_PARAMS_ERROR_CODE, format!("Invalid params: {e}")))
}
