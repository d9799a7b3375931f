//! The operations exposed to MCP clients.
//!
//! Copilot-backed tools all funnel through [`run_copilot`]: probe the
//! installation, resolve the effective model, execute, and render the
//! answer. Session tools only touch the registry.

mod ask;
mod code;
mod session;

use std::sync::Arc;

use copilot_core::ExecuteOptions;
use copilot_core::SupportedModel;
use copilot_core::Task;
use copilot_core::models::default_model;
use mcp_types::CallToolResult;
use mcp_types::Tool;
use schemars::JsonSchema;
use tracing::info;

use crate::tool_registry::ToolCallError;
use crate::tool_registry::ToolContext;
use crate::tool_registry::ToolRegistry;
use crate::tool_registry::input_schema_for;

pub use ask::ASK_TOOL_NAME;
pub use code::DEBUG_TOOL_NAME;
pub use code::EXPLAIN_TOOL_NAME;
pub use code::REFACTOR_TOOL_NAME;
pub use code::REVIEW_TOOL_NAME;
pub use code::SUGGEST_TOOL_NAME;
pub use code::TEST_GENERATE_TOOL_NAME;
pub use session::SESSION_HISTORY_TOOL_NAME;
pub use session::SESSION_START_TOOL_NAME;

/// Appended to answers cut short by the command timeout.
pub const TIMED_OUT_NOTE: &str = "(Copilot CLI timed out; the response may be incomplete.)";

/// Registers every tool, in the order clients will see them listed.
pub fn register_all(registry: &mut ToolRegistry) {
    let ask = Arc::new(ask::AskHandler);
    registry.register(ask::tool(), ask);

    let code = Arc::new(code::CodeTaskHandler);
    for tool in code::tools() {
        registry.register(tool, code.clone());
    }

    let session = Arc::new(session::SessionHandler);
    for tool in session::tools() {
        registry.register(tool, session.clone());
    }
}

pub(crate) fn tool_definition<P: JsonSchema>(name: &str, description: &str) -> Tool {
    Tool {
        name: name.to_string(),
        description: Some(description.to_string()),
        input_schema: input_schema_for::<P>(),
    }
}

/// Runs `prompt` through the CLI on behalf of `task`.
pub(crate) async fn run_copilot(
    context: &ToolContext,
    task: Task,
    prompt: &str,
    model: Option<SupportedModel>,
    options: ExecuteOptions,
) -> Result<CallToolResult, ToolCallError> {
    if !context.orchestrator.is_installed().await {
        return Err(ToolCallError::NotInstalled);
    }

    let model = model.unwrap_or_else(|| default_model(context.model_preference, task));
    info!(%task, %model, "dispatching to copilot");
    let output = context
        .orchestrator
        .execute(
            prompt,
            ExecuteOptions {
                model: Some(model),
                ..options
            },
        )
        .await?;

    let text = if output.timed_out {
        format!("{}\n\n{TIMED_OUT_NOTE}", output.text)
    } else {
        output.text
    };
    Ok(CallToolResult::text(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use copilot_core::CommandOrchestrator;
    use copilot_core::Config;
    use copilot_core::ModelPreference;
    use copilot_core::SessionRegistry;
    use pretty_assertions::assert_eq;

    #[test]
    fn registers_all_tools_in_order() {
        let config = Config::with_home(std::env::temp_dir());
        let mut registry = ToolRegistry::new(ToolContext {
            orchestrator: CommandOrchestrator::new(&config, SessionRegistry::new()),
            model_preference: ModelPreference::Claude,
        });
        register_all(&mut registry);

        let names: Vec<String> = registry.list().into_iter().map(|tool| tool.name).collect();
        assert_eq!(
            names,
            vec![
                ASK_TOOL_NAME,
                EXPLAIN_TOOL_NAME,
                SUGGEST_TOOL_NAME,
                DEBUG_TOOL_NAME,
                REFACTOR_TOOL_NAME,
                TEST_GENERATE_TOOL_NAME,
                REVIEW_TOOL_NAME,
                SESSION_START_TOOL_NAME,
                SESSION_HISTORY_TOOL_NAME,
            ]
        );
    }
}
