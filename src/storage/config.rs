//! Configuration handling for shellfmt
//!
//! Configuration is stored in `.shellfmt/config.toml` (project) and
//! `~/.config/shellfmt/config.toml` (global).

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::project::PROJECT_DIR;
use crate::domain::ScriptExtensions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// What a directory sweep does with an entry that is not a script
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NonScriptPolicy {
    /// Leave the entry alone and continue with the next one
    #[default]
    Skip,
    /// Stop the sweep with an error (a README in the directory stops everything)
    Abort,
}

impl NonScriptPolicy {
    pub fn as_str(&self) -> &str {
        match self {
            NonScriptPolicy::Skip => "skip",
            NonScriptPolicy::Abort => "abort",
        }
    }
}

/// How a changed script is written back
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WriteStrategy {
    /// Truncate and rewrite the open file; a crash in between loses content
    #[default]
    InPlace,
    /// Write a sibling temp file and rename it over the script
    Atomic,
}

impl WriteStrategy {
    pub fn as_str(&self) -> &str {
        match self {
            WriteStrategy::InPlace => "in_place",
            WriteStrategy::Atomic => "atomic",
        }
    }
}

/// Configuration for the formatter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    /// Script file extensions, including the dot
    pub extensions: Vec<String>,

    /// Spaces per indentation level (0 = tabs)
    pub indent: u8,

    /// Print `> file` instead of `>file`
    pub space_redirects: bool,

    /// Keep comments when formatting
    pub keep_comments: bool,

    /// Sweep behavior for entries that are not scripts
    pub on_non_script: NonScriptPolicy,

    /// How rewritten scripts are written to disk
    pub write_strategy: WriteStrategy,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            extensions: vec![".sh".to_string(), ".bash".to_string()],
            indent: 0,
            space_redirects: false,
            keep_comments: true,
            on_non_script: NonScriptPolicy::Skip,
            write_strategy: WriteStrategy::InPlace,
        }
    }
}

/// Configuration for watch sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Enable watch sessions
    pub enabled: bool,

    /// Change events buffered before the watcher blocks
    pub queue_capacity: usize,

    /// Also log events that left the script unchanged
    pub log_unchanged: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            queue_capacity: 64,
            log_unchanged: false,
        }
    }
}

/// Project-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Directory holding the scripts, relative to the project root
    pub scripts_dir: PathBuf,

    /// Formatter settings
    pub format: FormatConfig,

    /// Watch session settings
    pub watch: WatchConfig,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            scripts_dir: PathBuf::from("scripts"),
            format: FormatConfig::default(),
            watch: WatchConfig::default(),
        }
    }
}

impl ProjectConfig {
    /// Checks values serde cannot check
    pub fn validate(&self) -> Result<(), ConfigError> {
        let escapes = self
            .scripts_dir
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || self.scripts_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "scripts_dir must be a relative path inside the project, got '{}'",
                self.scripts_dir.display()
            )));
        }

        ScriptExtensions::new(&self.format.extensions)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.format.indent > 16 {
            return Err(ConfigError::Invalid(format!(
                "format.indent must be between 0 and 16, got {}",
                self.format.indent
            )));
        }

        if self.watch.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "watch.queue_capacity must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default output format (text or json)
    pub default_format: OutputFormat,
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Combined configuration (global + project)
#[derive(Debug, Clone)]
pub struct Config {
    pub project: ProjectConfig,
    pub global: GlobalConfig,
    pub project_root: Option<PathBuf>,
}

impl Config {
    /// Loads configuration for a specific project
    pub fn for_project(project_root: &Path) -> Result<Self> {
        let global = Self::load_global()?;
        let project = Self::load_project_config(project_root)?;

        Ok(Self {
            project,
            global,
            project_root: Some(project_root.to_path_buf()),
        })
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "shellfmt", "shellfmt").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Loads global configuration
    pub fn load_global() -> Result<GlobalConfig> {
        let config_dir = match Self::global_config_dir() {
            Some(dir) => dir,
            None => return Ok(GlobalConfig::default()),
        };

        let config_path = config_dir.join("config.toml");
        if !config_path.exists() {
            return Ok(GlobalConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read global config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse global config")
    }

    /// Loads and validates project configuration from a specific root
    fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
        let config_path = project_root.join(PROJECT_DIR).join("config.toml");

        if !config_path.exists() {
            return Ok(ProjectConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read project config: {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse project config")?;

        config
            .validate()
            .with_context(|| format!("Invalid project config: {}", config_path.display()))?;

        Ok(config)
    }

    /// Finds the project root by looking for a `.shellfmt/` directory
    pub fn find_project_root() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;

        loop {
            if current.join(PROJECT_DIR).is_dir() {
                return Some(current);
            }

            if !current.pop() {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config() {
        let config = Config {
            project: ProjectConfig::default(),
            global: GlobalConfig::default(),
            project_root: None,
        };

        assert_eq!(config.project.scripts_dir, PathBuf::from("scripts"));
        assert_eq!(config.project.format.extensions, vec![".sh", ".bash"]);
        assert_eq!(config.project.format.on_non_script, NonScriptPolicy::Skip);
        assert_eq!(config.project.format.write_strategy, WriteStrategy::InPlace);
        assert!(config.project.format.keep_comments);
        assert_eq!(config.global.default_format, OutputFormat::Text);
        assert!(config.project.validate().is_ok());
    }

    #[test]
    fn parse_project_config() {
        let toml = r#"
scripts_dir = "zeus"

[format]
indent = 4
on_non_script = "abort"
write_strategy = "atomic"

[watch]
queue_capacity = 8
"#;

        let config: ProjectConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.scripts_dir, PathBuf::from("zeus"));
        assert_eq!(config.format.indent, 4);
        assert_eq!(config.format.on_non_script, NonScriptPolicy::Abort);
        assert_eq!(config.format.write_strategy, WriteStrategy::Atomic);
        assert_eq!(config.format.extensions, vec![".sh", ".bash"]);
        assert_eq!(config.watch.queue_capacity, 8);
        assert!(config.watch.enabled);
    }

    #[test]
    fn parse_global_config() {
        let toml = r#"
default_format = "json"
"#;

        let config: GlobalConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.default_format, OutputFormat::Json);
    }

    #[test]
    fn rejects_scripts_dir_outside_project() {
        for dir in ["../elsewhere", "/abs/path", "a/../../b", ""] {
            let config = ProjectConfig {
                scripts_dir: PathBuf::from(dir),
                ..ProjectConfig::default()
            };
            assert!(config.validate().is_err(), "{dir}");
        }
    }

    #[test]
    fn rejects_bad_format_values() {
        let mut config = ProjectConfig::default();
        config.format.extensions = vec!["sh".to_string()];
        assert!(config.validate().is_err());

        let mut config = ProjectConfig::default();
        config.format.indent = 40;
        assert!(config.validate().is_err());

        let mut config = ProjectConfig::default();
        config.watch.queue_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_project_config_fails_to_load() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(PROJECT_DIR)).unwrap();
        fs::write(
            dir.path().join(PROJECT_DIR).join("config.toml"),
            "[format]\nextensions = []\n",
        )
        .unwrap();

        assert!(Config::for_project(dir.path()).is_err());
    }

    #[test]
    fn find_project_root() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(PROJECT_DIR)).unwrap();

        // Change to a subdirectory
        let sub_dir = dir.path().join("sub").join("dir");
        fs::create_dir_all(&sub_dir).unwrap();
        std::env::set_current_dir(&sub_dir).unwrap();

        let root = Config::find_project_root();
        // Canonicalize both paths to handle macOS /var -> /private/var symlinks
        let expected = dir.path().canonicalize().ok();
        let actual = root.and_then(|p| p.canonicalize().ok());
        assert_eq!(actual, expected);

        // Reset current dir to avoid affecting other tests
        std::env::set_current_dir(dir.path()).unwrap();
    }

    #[test]
    fn policy_names() {
        assert_eq!(NonScriptPolicy::Abort.as_str(), "abort");
        assert_eq!(WriteStrategy::InPlace.as_str(), "in_place");
    }
}
