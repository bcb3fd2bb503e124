//! Configuration file management for rubric.
//!
//! A TOML file names the agent and judge commands. Resolution chain:
//! `--config` flag > `RUBRIC_CONFIG` env > `./rubric.toml` >
//! `$XDG_CONFIG_HOME/rubric/config.toml` > built-in defaults. A missing
//! file on the default chain just means defaults; an explicitly named file
//! that cannot be read is an error.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use rubric_core::exec::ProcessRunner;

/// Name of the project-local config file.
pub const PROJECT_CONFIG: &str = "rubric.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default = "CommandSection::default_agent")]
    pub agent: CommandSection,
    #[serde(default = "CommandSection::default_judge")]
    pub judge: CommandSection,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            agent: CommandSection::default_agent(),
            judge: CommandSection::default_judge(),
        }
    }
}

/// One external command: program plus base arguments. The prompt itself is
/// delivered on stdin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSection {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSection {
    fn default_agent() -> Self {
        Self {
            command: "claude".to_string(),
            args: vec!["-p".to_string()],
        }
    }

    fn default_judge() -> Self {
        Self::default_agent()
    }

    /// Build the subprocess runner for this command.
    pub fn runner(&self) -> ProcessRunner {
        ProcessRunner::new(&self.command, self.args.clone())
    }
}

/// Return the rubric config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/rubric` or `~/.config/rubric`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("rubric");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("rubric")
}

/// Load and parse a config file at an explicit path. Errors if it does not
/// exist or does not parse.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(config)
}

/// Resolve the effective configuration.
pub fn resolve(cli_path: Option<&Path>) -> Result<ConfigFile> {
    if let Some(path) = cli_path {
        return load_config(path);
    }
    if let Ok(env_path) = std::env::var("RUBRIC_CONFIG") {
        return load_config(Path::new(&env_path));
    }

    let project = Path::new(PROJECT_CONFIG);
    if project.is_file() {
        return load_config(project);
    }

    let xdg = config_dir().join("config.toml");
    if xdg.is_file() {
        return load_config(&xdg);
    }

    Ok(ConfigFile::default())
}
