//! Read-only views of the session registry exposed as MCP resources.

use copilot_core::SessionErr;
use copilot_core::SessionId;
use copilot_core::SessionRegistry;
use mcp_types::ReadResourceResult;
use mcp_types::Resource;
use mcp_types::ResourceTemplate;
use mcp_types::TextResourceContents;
use thiserror::Error;

pub const SESSIONS_URI: &str = "copilot://sessions";
pub const SESSION_HISTORY_URI_TEMPLATE: &str = "copilot://session/{sessionId}/history";

const SESSION_URI_PREFIX: &str = "copilot://session/";
const HISTORY_URI_SUFFIX: &str = "/history";
const JSON_MIME_TYPE: &str = "application/json";

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("Resource not found: {0}")]
    UnknownUri(String),

    #[error(transparent)]
    Session(#[from] SessionErr),

    #[error("failed to encode resource: {0}")]
    Encode(#[from] serde_json::Error),
}

pub fn list_resources() -> Vec<Resource> {
    vec![Resource {
        uri: SESSIONS_URI.to_string(),
        name: "sessions-list".to_string(),
        description: Some("List all active Copilot sessions".to_string()),
        mime_type: Some(JSON_MIME_TYPE.to_string()),
    }]
}

pub fn list_resource_templates() -> Vec<ResourceTemplate> {
    vec![ResourceTemplate {
        uri_template: SESSION_HISTORY_URI_TEMPLATE.to_string(),
        name: "session-history".to_string(),
        description: Some("Access conversation history for a specific session".to_string()),
        mime_type: Some(JSON_MIME_TYPE.to_string()),
    }]
}

/// Resolves `uri` against the registry. Unknown sessions are an error, not
/// an empty document.
pub fn read_resource(
    uri: &str,
    sessions: &SessionRegistry,
) -> Result<ReadResourceResult, ResourceError> {
    let text = if uri == SESSIONS_URI {
        serde_json::to_string_pretty(&sessions.list_summaries())?
    } else if let Some(id) = session_id_from_history_uri(uri) {
        let session = sessions.require(&SessionId::from(id))?;
        serde_json::to_string_pretty(&session)?
    } else {
        return Err(ResourceError::UnknownUri(uri.to_string()));
    };

    Ok(ReadResourceResult {
        contents: vec![TextResourceContents {
            uri: uri.to_string(),
            mime_type: Some(JSON_MIME_TYPE.to_string()),
            text,
        }],
    })
}

fn session_id_from_history_uri(uri: &str) -> Option<&str> {
    let id = uri
        .strip_prefix(SESSION_URI_PREFIX)?
        .strip_suffix(HISTORY_URI_SUFFIX)?;
    (!id.is_empty() && !id.contains('/')).then_some(id)
}
