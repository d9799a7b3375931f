use std::path::PathBuf;

use clap::Parser;
use copilot_core::ConfigOverrides;
use copilot_core::ModelPreference;
use copilot_mcp_server::run_main;

/// Serve the GitHub Copilot CLI over the Model Context Protocol (stdio).
#[derive(Debug, Parser)]
#[command(name = "copilot-mcp-server", version, about)]
struct Cli {
    /// Copilot CLI executable to launch.
    #[arg(long = "copilot-bin", value_name = "PATH")]
    copilot_bin: Option<String>,

    /// Data directory. Defaults to $COPILOT_HOME, then ~/.copilot.
    #[arg(long, value_name = "DIR")]
    home: Option<PathBuf>,

    /// Model family used when a call does not name a model.
    #[arg(long, value_name = "claude|gpt")]
    prefer: Option<ModelPreference>,
}

impl Cli {
    fn into_overrides(self) -> ConfigOverrides {
        ConfigOverrides {
            program: self.copilot_bin,
            home: self.home,
            model_preference: self.prefer,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_main(cli.into_overrides()).await
}
