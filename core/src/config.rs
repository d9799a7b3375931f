use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::CopilotErr;
use crate::error::Result;
use crate::models::ModelPreference;

/// Optional file inside the data directory that tweaks server behaviour.
pub const CONFIG_TOML_FILE: &str = "copilot-mcp.toml";

pub const DEFAULT_PROGRAM: &str = "copilot";

const LOGS_DIR: &str = "logs";
const SESSIONS_DIR: &str = "mcp-sessions";

/// Delays and deadlines used while driving the external CLI.
///
/// `startup_delay < response_wait < command_timeout` must hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Time given to the CLI to print its banner before the prompt is sent.
    pub startup_delay: Duration,
    /// Time after the prompt is sent before `/exit` is written.
    pub response_wait: Duration,
    /// Absolute ceiling for one command.
    pub command_timeout: Duration,
    /// Ceiling for the `--version` installation probe.
    pub version_check_timeout: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            startup_delay: Duration::from_millis(1_000),
            response_wait: Duration::from_millis(5_000),
            command_timeout: Duration::from_millis(60_000),
            version_check_timeout: Duration::from_millis(5_000),
        }
    }
}

impl Timeouts {
    pub fn validate(&self) -> Result<()> {
        if self.startup_delay >= self.response_wait {
            return Err(CopilotErr::Config(format!(
                "startup delay ({:?}) must be shorter than the response wait ({:?})",
                self.startup_delay, self.response_wait
            )));
        }
        if self.response_wait >= self.command_timeout {
            return Err(CopilotErr::Config(format!(
                "response wait ({:?}) must be shorter than the command timeout ({:?})",
                self.response_wait, self.command_timeout
            )));
        }
        Ok(())
    }
}

/// Directories owned by the external CLI that the server makes sure exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopilotPaths {
    pub home: PathBuf,
    pub logs_dir: PathBuf,
    pub sessions_dir: PathBuf,
}

impl CopilotPaths {
    pub fn new(home: PathBuf) -> Self {
        Self {
            logs_dir: home.join(LOGS_DIR),
            sessions_dir: home.join(SESSIONS_DIR),
            home,
        }
    }

    /// Creates the data, log and session directories if they are missing.
    pub async fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.home, &self.logs_dir, &self.sessions_dir] {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }
}

/// Returns the data directory: `$COPILOT_HOME` when set, else `~/.copilot`.
pub fn find_copilot_home() -> std::io::Result<PathBuf> {
    if let Ok(val) = std::env::var("COPILOT_HOME")
        && !val.is_empty()
    {
        return Ok(PathBuf::from(val));
    }

    let mut home = dirs::home_dir().ok_or_else(|| {
        std::io::Error::new(ErrorKind::NotFound, "could not find home directory")
    })?;
    home.push(".copilot");
    Ok(home)
}

/// Shape of `copilot-mcp.toml`. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigToml {
    pub program: Option<String>,
    pub model_preference: Option<ModelPreference>,
    pub startup_delay_ms: Option<u64>,
    pub response_wait_ms: Option<u64>,
    pub command_timeout_ms: Option<u64>,
    pub version_check_timeout_ms: Option<u64>,
}

/// Values supplied on the command line; they win over the TOML file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub program: Option<String>,
    pub home: Option<PathBuf>,
    pub model_preference: Option<ModelPreference>,
}

/// Resolved server configuration. Built once at startup and shared.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Executable launched for every command and for the installation probe.
    pub program: String,
    pub paths: CopilotPaths,
    pub timeouts: Timeouts,
    pub model_preference: ModelPreference,
}

impl Config {
    pub fn load(overrides: ConfigOverrides) -> Result<Self> {
        let home = match overrides.home.clone() {
            Some(home) => home,
            None => find_copilot_home()?,
        };
        let toml = load_config_toml(&home)?;
        Self::from_parts(home, toml, overrides)
    }

    pub fn from_parts(home: PathBuf, toml: ConfigToml, overrides: ConfigOverrides) -> Result<Self> {
        let defaults = Timeouts::default();
        let timeouts = Timeouts {
            startup_delay: toml
                .startup_delay_ms
                .map_or(defaults.startup_delay, Duration::from_millis),
            response_wait: toml
                .response_wait_ms
                .map_or(defaults.response_wait, Duration::from_millis),
            command_timeout: toml
                .command_timeout_ms
                .map_or(defaults.command_timeout, Duration::from_millis),
            version_check_timeout: toml
                .version_check_timeout_ms
                .map_or(defaults.version_check_timeout, Duration::from_millis),
        };
        timeouts.validate()?;

        Ok(Self {
            program: overrides
                .program
                .or(toml.program)
                .unwrap_or_else(|| DEFAULT_PROGRAM.to_string()),
            paths: CopilotPaths::new(home),
            timeouts,
            model_preference: overrides
                .model_preference
                .or(toml.model_preference)
                .unwrap_or_default(),
        })
    }

    /// Defaults rooted at `home`, ignoring any file on disk.
    pub fn with_home(home: PathBuf) -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            paths: CopilotPaths::new(home),
            timeouts: Timeouts::default(),
            model_preference: ModelPreference::default(),
        }
    }
}

fn load_config_toml(home: &Path) -> Result<ConfigToml> {
    let path = home.join(CONFIG_TOML_FILE);
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no config file; using defaults");
            return Ok(ConfigToml::default());
        }
        Err(err) => return Err(err.into()),
    };
    toml::from_str(&contents)
        .map_err(|err| CopilotErr::Config(format!("failed to parse {}: {err}", path.display())))
}
