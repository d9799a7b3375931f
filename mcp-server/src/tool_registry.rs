use std::sync::Arc;

use async_trait::async_trait;
use copilot_core::CommandOrchestrator;
use copilot_core::CopilotErr;
use copilot_core::ModelPreference;
use copilot_core::SessionRegistry;
use indexmap::IndexMap;
use mcp_types::CallToolResult;
use mcp_types::Tool;
use mcp_types::ToolInputSchema;
use schemars::JsonSchema;
use schemars::r#gen::SchemaSettings;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use tracing::warn;

pub const NOT_INSTALLED_MESSAGE: &str =
    "GitHub Copilot CLI is not installed.\n\nInstall: npm install -g @github/copilot";

pub const NO_SESSION_MESSAGE: &str =
    "No session found. Start a new session with copilot-session-start.";

/// Shared state every handler can reach.
#[derive(Debug)]
pub struct ToolContext {
    pub orchestrator: CommandOrchestrator,
    pub model_preference: ModelPreference,
}

impl ToolContext {
    pub fn sessions(&self) -> &SessionRegistry {
        self.orchestrator.sessions()
    }
}

pub struct ToolInvocation {
    pub context: Arc<ToolContext>,
    pub tool_name: String,
    pub arguments: Option<Value>,
}

#[derive(Debug, Error)]
pub enum ToolCallError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("{}", NOT_INSTALLED_MESSAGE)]
    NotInstalled,

    #[error("{}", NO_SESSION_MESSAGE)]
    NoSession,

    #[error(transparent)]
    Copilot(#[from] CopilotErr),
}

impl ToolCallError {
    /// Error-flagged payload returned to the client. Session lookups keep
    /// their bare message; everything else is prefixed with `Error: `.
    pub fn into_result(self) -> CallToolResult {
        match self {
            Self::NoSession => CallToolResult::error(NO_SESSION_MESSAGE),
            other => CallToolResult::error(format!("Error: {other}")),
        }
    }
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, invocation: ToolInvocation) -> Result<CallToolResult, ToolCallError>;
}

/// Decodes tool arguments into `P`. Absent arguments decode like `{}`.
pub fn parse_arguments<P: DeserializeOwned>(
    tool_name: &str,
    arguments: Option<Value>,
) -> Result<P, ToolCallError> {
    let arguments = arguments.unwrap_or_else(|| Value::Object(Default::default()));
    serde_json::from_value(arguments).map_err(|e| ToolCallError::InvalidArguments {
        tool: tool_name.to_string(),
        message: e.to_string(),
    })
}

/// Input schema for a parameter struct, with nested definitions inlined so
/// clients see a single self-contained object.
pub fn input_schema_for<P: JsonSchema>() -> ToolInputSchema {
    let schema = SchemaSettings::draft2019_09()
        .with(|s| {
            s.inline_subschemas = true;
            s.option_add_null_type = false;
        })
        .into_generator()
        .into_root_schema_for::<P>();

    serde_json::to_value(&schema)
        .and_then(serde_json::from_value::<ToolInputSchema>)
        .unwrap_or_else(|err| {
            warn!(error = %err, "falling back to an empty input schema");
            ToolInputSchema {
                r#type: "object".to_string(),
                properties: None,
                required: None,
            }
        })
}

struct RegisteredTool {
    tool: Tool,
    handler: Arc<dyn ToolHandler>,
}

/// Named operations exposed over `tools/list` and `tools/call`, listed in
/// registration order.
pub struct ToolRegistry {
    context: Arc<ToolContext>,
    tools: IndexMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new(context: ToolContext) -> Self {
        Self {
            context: Arc::new(context),
            tools: IndexMap::new(),
        }
    }

    pub fn context(&self) -> &ToolContext {
        &self.context
    }

    pub fn register(&mut self, tool: Tool, handler: Arc<dyn ToolHandler>) {
        if self.tools.contains_key(&tool.name) {
            warn!(tool = %tool.name, "replacing previously registered tool");
        }
        self.tools
            .insert(tool.name.clone(), RegisteredTool { tool, handler });
    }

    pub fn list(&self) -> Vec<Tool> {
        self.tools.values().map(|entry| entry.tool.clone()).collect()
    }

    /// Runs `name`. Never fails: every error becomes an error-flagged result.
    pub async fn call(&self, name: &str, arguments: Option<Value>) -> CallToolResult {
        let Some(entry) = self.tools.get(name) else {
            return ToolCallError::UnknownTool(name.to_string()).into_result();
        };
        debug!(tool = name, "tool call started");
        let invocation = ToolInvocation {
            context: Arc::clone(&self.context),
            tool_name: name.to_string(),
            arguments,
        };
        match entry.handler.handle(invocation).await {
            Ok(result) => result,
            Err(err) => {
                debug!(tool = name, error = %err, "tool call failed");
                err.into_result()
            }
        }
    }
}
