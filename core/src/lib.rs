//! Root of the `copilot-core` library.
//!
//! Everything needed to run the interactive Copilot CLI as a one-shot
//! request/response backend: configuration, the installation probe, the
//! command orchestrator and the in-memory session registry.

// Prevent accidental direct writes to stdout/stderr in library code. The
// MCP transport owns stdout.
#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod probe;
pub mod prompts;
pub mod session;
mod spawn;

pub use config::Config;
pub use config::ConfigOverrides;
pub use config::CopilotPaths;
pub use config::Timeouts;
pub use error::CopilotErr;
pub use error::SessionErr;
pub use models::ModelPreference;
pub use models::SupportedModel;
pub use models::Task;
pub use orchestrator::CommandOrchestrator;
pub use orchestrator::CommandOutput;
pub use orchestrator::ExecuteOptions;
pub use session::Exchange;
pub use session::Session;
pub use session::SessionId;
pub use session::SessionRegistry;
pub use session::SessionSummary;
