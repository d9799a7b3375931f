use std::path::PathBuf;

use async_trait::async_trait;
use copilot_core::ExecuteOptions;
use copilot_core::SupportedModel;
use copilot_core::Task;
use mcp_types::CallToolResult;
use mcp_types::Tool;
use schemars::JsonSchema;
use serde::Deserialize;

use super::run_copilot;
use super::tool_definition;
use crate::tool_registry::ToolCallError;
use crate::tool_registry::ToolHandler;
use crate::tool_registry::ToolInvocation;
use crate::tool_registry::parse_arguments;

pub const ASK_TOOL_NAME: &str = "ask-copilot";

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AskCopilotParams {
    /// The question or task to ask GitHub Copilot CLI.
    prompt: String,
    /// Optional additional context (file paths, code snippets, etc.).
    #[serde(default)]
    context: Option<String>,
    /// AI model to use. Defaults to the preferred family's model for general questions.
    #[serde(default)]
    model: Option<SupportedModel>,
    /// Allow all tools to run automatically without confirmation.
    #[serde(default = "default_allow_all_tools")]
    allow_all_tools: bool,
    /// Working directory for Copilot CLI to execute in (required for file operations).
    #[serde(default)]
    cwd: Option<PathBuf>,
}

fn default_allow_all_tools() -> bool {
    true
}

pub(crate) fn tool() -> Tool {
    tool_definition::<AskCopilotParams>(
        ASK_TOOL_NAME,
        "Ask GitHub Copilot CLI to help with coding tasks, generate commands, explain code, or provide suggestions",
    )
}

pub(crate) struct AskHandler;

#[async_trait]
impl ToolHandler for AskHandler {
    async fn handle(&self, invocation: ToolInvocation) -> Result<CallToolResult, ToolCallError> {
        let params: AskCopilotParams =
            parse_arguments(&invocation.tool_name, invocation.arguments)?;
        let options = ExecuteOptions {
            context: params.context,
            allow_all_tools: params.allow_all_tools,
            cwd: params.cwd,
            ..Default::default()
        };
        run_copilot(
            &invocation.context,
            Task::Ask,
            &params.prompt,
            params.model,
            options,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn allow_all_tools_defaults_to_true() {
        let params: AskCopilotParams =
            parse_arguments(ASK_TOOL_NAME, Some(json!({ "prompt": "hi" }))).expect("params");
        assert!(params.allow_all_tools);
        assert_eq!(params.model, None);

        let params: AskCopilotParams = parse_arguments(
            ASK_TOOL_NAME,
            Some(json!({ "prompt": "hi", "allowAllTools": false, "model": "gpt-5.2" })),
        )
        .expect("params");
        assert!(!params.allow_all_tools);
        assert_eq!(params.model, Some(SupportedModel::Gpt52));
    }

    #[test]
    fn rejects_models_outside_the_allow_list() {
        let err = parse_arguments::<AskCopilotParams>(
            ASK_TOOL_NAME,
            Some(json!({ "prompt": "hi", "model": "gpt-3" })),
        )
        .expect_err("unknown model");
        assert!(matches!(err, ToolCallError::InvalidArguments { .. }));
    }

    #[test]
    fn schema_requires_only_prompt() {
        let schema = tool().input_schema;
        assert_eq!(schema.required, Some(vec!["prompt".to_string()]));
        let properties = schema.properties.expect("properties");
        for key in ["prompt", "context", "model", "allowAllTools", "cwd"] {
            assert!(properties.get(key).is_some(), "missing {key}");
        }
        assert!(properties["model"]["enum"]
            .as_array()
            .expect("enum")
            .contains(&json!("claude-sonnet-4.5")));
    }
}
