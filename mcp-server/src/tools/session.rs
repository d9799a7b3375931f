use async_trait::async_trait;
use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use copilot_core::Session;
use copilot_core::SessionId;
use mcp_types::CallToolResult;
use mcp_types::Tool;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::info;

use super::tool_definition;
use crate::tool_registry::ToolCallError;
use crate::tool_registry::ToolHandler;
use crate::tool_registry::ToolInvocation;
use crate::tool_registry::parse_arguments;

pub const SESSION_START_TOOL_NAME: &str = "copilot-session-start";
pub const SESSION_HISTORY_TOOL_NAME: &str = "copilot-session-history";

/// Responses longer than this are cut in the history view.
const RESPONSE_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct SessionStartParams {}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionHistoryParams {
    /// Session ID (defaults to current session).
    #[serde(default)]
    session_id: Option<String>,
}

pub(crate) fn tools() -> Vec<Tool> {
    vec![
        tool_definition::<SessionStartParams>(
            SESSION_START_TOOL_NAME,
            "Start a new Copilot conversation session",
        ),
        tool_definition::<SessionHistoryParams>(
            SESSION_HISTORY_TOOL_NAME,
            "Retrieve the conversation history for the current session",
        ),
    ]
}

pub(crate) struct SessionHandler;

#[async_trait]
impl ToolHandler for SessionHandler {
    async fn handle(&self, invocation: ToolInvocation) -> Result<CallToolResult, ToolCallError> {
        let sessions = invocation.context.sessions();
        match invocation.tool_name.as_str() {
            SESSION_START_TOOL_NAME => {
                let _: SessionStartParams =
                    parse_arguments(&invocation.tool_name, invocation.arguments)?;
                let id = sessions.create_session();
                info!(session_id = %id, "session started by client");
                Ok(CallToolResult::text(format!(
                    "New session started: {id}\nAll subsequent interactions will be tracked in this session."
                )))
            }
            SESSION_HISTORY_TOOL_NAME => {
                let params: SessionHistoryParams =
                    parse_arguments(&invocation.tool_name, invocation.arguments)?;
                let target = params
                    .session_id
                    .filter(|id| !id.is_empty())
                    .map(SessionId::from)
                    .or_else(|| sessions.current_id());
                let session = target
                    .and_then(|id| sessions.get(&id))
                    .ok_or(ToolCallError::NoSession)?;
                Ok(CallToolResult::text(render_history(&session)))
            }
            other => Err(ToolCallError::UnknownTool(other.to_string())),
        }
    }
}

fn iso(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn render_history(session: &Session) -> String {
    let entries: Vec<String> = session
        .history
        .iter()
        .enumerate()
        .map(|(i, exchange)| {
            let preview: String = exchange
                .response
                .chars()
                .take(RESPONSE_PREVIEW_CHARS)
                .collect();
            format!(
                "\n[{}] {}\nPrompt: {}\nResponse: {preview}...",
                i + 1,
                iso(&exchange.timestamp),
                exchange.prompt,
            )
        })
        .collect();
    let history = if entries.is_empty() {
        " (empty)".to_string()
    } else {
        entries.join("\n")
    };

    format!(
        "Session: {}\nStarted: {}\nLast Activity: {}\n\nHistory:{history}",
        session.id,
        iso(&session.start_time),
        iso(&session.last_activity),
    )
}
