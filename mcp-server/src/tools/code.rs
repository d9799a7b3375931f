use async_trait::async_trait;
use copilot_core::ExecuteOptions;
use copilot_core::SupportedModel;
use copilot_core::Task;
use copilot_core::prompts;
use mcp_types::CallToolResult;
use mcp_types::Tool;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use super::run_copilot;
use super::tool_definition;
use crate::tool_registry::ToolCallError;
use crate::tool_registry::ToolHandler;
use crate::tool_registry::ToolInvocation;
use crate::tool_registry::parse_arguments;

pub const EXPLAIN_TOOL_NAME: &str = "copilot-explain";
pub const SUGGEST_TOOL_NAME: &str = "copilot-suggest";
pub const DEBUG_TOOL_NAME: &str = "copilot-debug";
pub const REFACTOR_TOOL_NAME: &str = "copilot-refactor";
pub const TEST_GENERATE_TOOL_NAME: &str = "copilot-test-generate";
pub const REVIEW_TOOL_NAME: &str = "copilot-review";

#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct ExplainParams {
    /// The code or concept to explain.
    code: String,
    /// AI model to use.
    #[serde(default)]
    model: Option<SupportedModel>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct SuggestParams {
    /// The task you want to accomplish.
    task: String,
    /// AI model to use.
    #[serde(default)]
    model: Option<SupportedModel>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct DebugParams {
    /// The code with the error.
    code: String,
    /// The error message or description.
    error: String,
    /// Additional context about the error.
    #[serde(default)]
    context: Option<String>,
    /// AI model to use.
    #[serde(default)]
    model: Option<SupportedModel>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct RefactorParams {
    /// The code to refactor.
    code: String,
    /// Specific refactoring goal (e.g. "improve performance", "increase readability").
    #[serde(default)]
    goal: Option<String>,
    /// AI model to use.
    #[serde(default)]
    model: Option<SupportedModel>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct TestGenerateParams {
    /// The code to generate tests for.
    code: String,
    /// Testing framework to use (e.g. "jest", "pytest", "cargo test").
    #[serde(default)]
    framework: Option<String>,
    /// AI model to use.
    #[serde(default)]
    model: Option<SupportedModel>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReviewParams {
    /// The code to review.
    code: String,
    /// Specific areas to focus on (e.g. ["security", "performance"]).
    #[serde(default)]
    focus_areas: Option<Vec<String>>,
    /// AI model to use.
    #[serde(default)]
    model: Option<SupportedModel>,
}

pub(crate) fn tools() -> Vec<Tool> {
    vec![
        tool_definition::<ExplainParams>(
            EXPLAIN_TOOL_NAME,
            "Get detailed explanations of code or technical concepts",
        ),
        tool_definition::<SuggestParams>(
            SUGGEST_TOOL_NAME,
            "Get CLI command suggestions for specific tasks",
        ),
        tool_definition::<DebugParams>(DEBUG_TOOL_NAME, "Help debug code errors and issues"),
        tool_definition::<RefactorParams>(
            REFACTOR_TOOL_NAME,
            "Suggest refactoring improvements for code",
        ),
        tool_definition::<TestGenerateParams>(
            TEST_GENERATE_TOOL_NAME,
            "Generate unit tests for code",
        ),
        tool_definition::<ReviewParams>(REVIEW_TOOL_NAME, "Get a code review with suggestions"),
    ]
}

/// A task-specific prompt, ready to send.
#[derive(Debug, PartialEq)]
struct PreparedCall {
    task: Task,
    prompt: String,
    model: Option<SupportedModel>,
}

fn prepare(
    tool_name: &str,
    arguments: Option<Value>,
) -> Result<PreparedCall, ToolCallError> {
    let call = match tool_name {
        EXPLAIN_TOOL_NAME => {
            let params: ExplainParams = parse_arguments(tool_name, arguments)?;
            PreparedCall {
                task: Task::Explain,
                prompt: prompts::explain(&params.code),
                model: params.model,
            }
        }
        SUGGEST_TOOL_NAME => {
            let params: SuggestParams = parse_arguments(tool_name, arguments)?;
            PreparedCall {
                task: Task::Suggest,
                prompt: prompts::suggest(&params.task),
                model: params.model,
            }
        }
        DEBUG_TOOL_NAME => {
            let params: DebugParams = parse_arguments(tool_name, arguments)?;
            // `context` is folded into the prompt here, so the call runs without
            // a separate context merge.
            PreparedCall {
                task: Task::Debug,
                prompt: prompts::debug(&params.code, &params.error, params.context.as_deref()),
                model: params.model,
            }
        }
        REFACTOR_TOOL_NAME => {
            let params: RefactorParams = parse_arguments(tool_name, arguments)?;
            PreparedCall {
                task: Task::Refactor,
                prompt: prompts::refactor(&params.code, params.goal.as_deref()),
                model: params.model,
            }
        }
        TEST_GENERATE_TOOL_NAME => {
            let params: TestGenerateParams = parse_arguments(tool_name, arguments)?;
            PreparedCall {
                task: Task::TestGenerate,
                prompt: prompts::test_generate(&params.code, params.framework.as_deref()),
                model: params.model,
            }
        }
        REVIEW_TOOL_NAME => {
            let params: ReviewParams = parse_arguments(tool_name, arguments)?;
            PreparedCall {
                task: Task::Review,
                prompt: prompts::review(&params.code, &params.focus_areas.unwrap_or_default()),
                model: params.model,
            }
        }
        other => return Err(ToolCallError::UnknownTool(other.to_string())),
    };
    Ok(call)
}

/// Serves every code-oriented tool; the prompt template is picked by tool name.
pub(crate) struct CodeTaskHandler;

#[async_trait]
impl ToolHandler for CodeTaskHandler {
    async fn handle(&self, invocation: ToolInvocation) -> Result<CallToolResult, ToolCallError> {
        let ToolInvocation {
            context,
            tool_name,
            arguments,
        } = invocation;
        let call = prepare(&tool_name, arguments)?;
        run_copilot(
            &context,
            call.task,
            &call.prompt,
            call.model,
            ExecuteOptions::default(),
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
    fn explain_and_suggest_use_their_templates() {
        let call = prepare(EXPLAIN_TOOL_NAME, Some(json!({ "code": "x + 1" }))).expect("call");
        assert_eq!(
            call,
            PreparedCall {
                task: Task::Explain,
                prompt: "Please explain this code:\n\nx + 1".to_string(),
                model: None,
            }
        );

        let call = prepare(
            SUGGEST_TOOL_NAME,
            Some(json!({ "task": "find large files", "model": "claude-opus-4.5" })),
        )
        .expect("call");
        assert_eq!(call.prompt, "Suggest a command for: find large files");
        assert_eq!(call.model, Some(SupportedModel::ClaudeOpus45));
    }

    #[test]
    fn debug_puts_context_in_prompt() {
        let call = prepare(
            DEBUG_TOOL_NAME,
            Some(json!({ "code": "a()", "error": "undefined", "context": "browser" })),
        )
        .expect("call");
        assert_eq!(call.task, Task::Debug);
        assert!(call.prompt.contains("Error: undefined"));
        assert!(call.prompt.contains("Context: browser"));
        assert_eq!(call.prompt.matches("browser").count(), 1);
    }

    #[test]
    fn review_reads_camel_case_focus_areas() {
        let call = prepare(
            REVIEW_TOOL_NAME,
            Some(json!({ "code": "x", "focusAreas": ["security"] })),
        )
        .expect("call");
        assert!(call.prompt.contains("Focus areas: security"));
    }

    #[test]
    fn missing_required_argument_is_invalid() {
        let err = prepare(DEBUG_TOOL_NAME, Some(json!({ "code": "x" }))).expect_err("error");
        assert!(matches!(err, ToolCallError::InvalidArguments { .. }));
    }

    #[test]
    fn every_tool_accepts_a_model() {
        for tool in tools() {
            let properties = tool.input_schema.properties.expect("properties");
            assert!(properties.get("model").is_some(), "{} lacks model", tool.name);
        }
    }
}
