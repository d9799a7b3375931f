//! Model allow-list and per-task defaults.
//!
//! Every `model` argument accepted by the server must be one of
//! [`SupportedModel`]. When a caller omits it, the handler resolves a
//! default once via [`default_model`] using the preference chosen at
//! startup.

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use strum_macros::AsRefStr;
use strum_macros::Display;
use strum_macros::EnumIter;
use strum_macros::EnumString;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
pub enum SupportedModel {
    #[serde(rename = "claude-sonnet-4.5")]
    #[strum(serialize = "claude-sonnet-4.5")]
    ClaudeSonnet45,
    #[serde(rename = "claude-haiku-4.5")]
    #[strum(serialize = "claude-haiku-4.5")]
    ClaudeHaiku45,
    #[serde(rename = "claude-opus-4.5")]
    #[strum(serialize = "claude-opus-4.5")]
    ClaudeOpus45,
    #[serde(rename = "gpt-5.1")]
    #[strum(serialize = "gpt-5.1")]
    Gpt51,
    #[serde(rename = "gpt-5.1-codex")]
    #[strum(serialize = "gpt-5.1-codex")]
    Gpt51Codex,
    #[serde(rename = "gpt-5.1-codex-mini")]
    #[strum(serialize = "gpt-5.1-codex-mini")]
    Gpt51CodexMini,
    #[serde(rename = "gpt-5.1-codex-max")]
    #[strum(serialize = "gpt-5.1-codex-max")]
    Gpt51CodexMax,
    #[serde(rename = "gpt-5.2")]
    #[strum(serialize = "gpt-5.2")]
    Gpt52,
    #[serde(rename = "gpt-5-mini")]
    #[strum(serialize = "gpt-5-mini")]
    Gpt5Mini,
    #[serde(rename = "gpt-4.1")]
    #[strum(serialize = "gpt-4.1")]
    Gpt41,
    #[serde(rename = "gemini-3-pro-preview")]
    #[strum(serialize = "gemini-3-pro-preview")]
    Gemini3ProPreview,
}

/// Which model family to fall back to when a call does not name a model.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ModelPreference {
    #[default]
    Claude,
    Gpt,
}

/// The Copilot-backed operations that carry a default model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Task {
    Ask,
    Explain,
    Suggest,
    Debug,
    Refactor,
    Review,
    TestGenerate,
}

#[must_use]
pub fn default_model(preference: ModelPreference, task: Task) -> SupportedModel {
    use SupportedModel::*;

    match (preference, task) {
        (ModelPreference::Claude, Task::Ask | Task::Explain | Task::TestGenerate) => {
            ClaudeSonnet45
        }
        (ModelPreference::Claude, Task::Suggest) => ClaudeOpus45,
        (ModelPreference::Claude, Task::Debug | Task::Refactor) => ClaudeHaiku45,
        (ModelPreference::Gpt, Task::Ask | Task::Suggest) => Gpt51CodexMax,
        (ModelPreference::Gpt, Task::Explain | Task::TestGenerate) => Gpt51Codex,
        (ModelPreference::Gpt, Task::Debug | Task::Refactor) => Gpt51CodexMini,
        (_, Task::Review) => Gpt41,
    }
}
