//! Project management
//!
//! Handles project initialization and locates the scripts directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use super::{Config, FormatLock, ProjectConfig, SessionLog};

/// Marker directory at the project root
pub const PROJECT_DIR: &str = ".shellfmt";

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Not in a shellfmt project. Run 'shellfmt init' first.")]
    NotInProject,

    #[error("Scripts directory does not exist: {0}")]
    MissingScriptsDir(PathBuf),

    #[error("{} is not inside the scripts directory {}", .path.display(), .scripts_dir.display())]
    OutsideScriptsDir { path: PathBuf, scripts_dir: PathBuf },
}

/// A shellfmt project
pub struct Project {
    root: PathBuf,
    config: Config,
}

impl Project {
    /// Opens an existing project at the given path
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        if !root.join(PROJECT_DIR).is_dir() {
            return Err(ProjectError::NotInProject.into());
        }

        let config = Config::for_project(&root)?;

        Ok(Self { root, config })
    }

    /// Opens the project at the current directory or a parent
    pub fn open_current() -> Result<Self> {
        let root = Config::find_project_root().ok_or(ProjectError::NotInProject)?;

        Self::open(root)
    }

    /// Initializes a new project at the given path
    ///
    /// An existing `config.toml` is left untouched, so `scripts_dir` only
    /// applies the first time.
    pub fn init(root: impl Into<PathBuf>, scripts_dir: Option<&Path>) -> Result<Self> {
        let root = root.into();
        let project_dir = root.join(PROJECT_DIR);
        let scripts_dir = scripts_dir.unwrap_or(Path::new("scripts"));

        ProjectConfig {
            scripts_dir: scripts_dir.to_path_buf(),
            ..ProjectConfig::default()
        }
        .validate()?;

        fs::create_dir_all(&project_dir).with_context(|| {
            format!("Failed to create {PROJECT_DIR} directory: {}", project_dir.display())
        })?;

        let config_path = project_dir.join("config.toml");
        if !config_path.exists() {
            let default_config = format!(
                r#"# shellfmt configuration

# Directory holding the scripts, relative to the project root
scripts_dir = "{}"

[format]
extensions = [".sh", ".bash"]
# Spaces per indentation level, 0 for tabs
indent = 0
space_redirects = false
keep_comments = true
# "skip" or "abort"
on_non_script = "skip"
# "in_place" or "atomic"
write_strategy = "in_place"

[watch]
enabled = true
queue_capacity = 64
log_unchanged = false
"#,
                scripts_dir.display()
            );
            fs::write(&config_path, default_config)
                .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
        }

        let gitignore_path = project_dir.join(".gitignore");
        if !gitignore_path.exists() {
            let gitignore = r#"# Watch session state
watch.pid
watch.log*
format.lock
"#;
            fs::write(&gitignore_path, gitignore).with_context(|| {
                format!("Failed to write .gitignore: {}", gitignore_path.display())
            })?;
        }

        let project = Self::open(root)?;

        let scripts = project.scripts_dir();
        fs::create_dir_all(&scripts).with_context(|| {
            format!("Failed to create scripts directory: {}", scripts.display())
        })?;

        Ok(project)
    }

    /// Returns the project root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the .shellfmt directory path
    pub fn project_dir(&self) -> PathBuf {
        self.root.join(PROJECT_DIR)
    }

    /// Returns the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the designated scripts directory
    pub fn scripts_dir(&self) -> PathBuf {
        self.root.join(&self.config.project.scripts_dir)
    }

    /// Returns the scripts directory, failing if it was removed
    pub fn require_scripts_dir(&self) -> Result<PathBuf> {
        let dir = self.scripts_dir();
        if !dir.is_dir() {
            return Err(ProjectError::MissingScriptsDir(dir).into());
        }
        Ok(dir)
    }

    /// Returns the watch session PID file
    pub fn pid_path(&self) -> PathBuf {
        self.project_dir().join("watch.pid")
    }

    /// Returns the watch session log
    pub fn session_log(&self) -> SessionLog {
        SessionLog::new(self.project_dir().join("watch.log"))
    }

    /// Returns the lock file serializing formatting runs
    pub fn lock_path(&self) -> PathBuf {
        self.project_dir().join("format.lock")
    }

    /// Blocks until no other shellfmt process is formatting this project
    pub fn lock_formatting(&self) -> io::Result<FormatLock> {
        FormatLock::acquire(&self.lock_path())
    }

    /// Resolves a path the user named and checks it sits directly in the
    /// scripts directory
    ///
    /// Only the parent is resolved, so a symlink stays a symlink.
    pub fn designated_path(&self, path: &Path) -> Result<PathBuf> {
        let scripts_dir = self
            .require_scripts_dir()?
            .canonicalize()
            .context("Failed to resolve scripts directory")?;

        let outside = || ProjectError::OutsideScriptsDir {
            path: path.to_path_buf(),
            scripts_dir: scripts_dir.clone(),
        };

        let name = path.file_name().ok_or_else(outside)?;
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let parent = parent
            .canonicalize()
            .with_context(|| format!("Failed to resolve {}", path.display()))?;

        if parent != scripts_dir {
            return Err(outside().into());
        }

        Ok(parent.join(name))
    }

    /// Returns a relative path from the project root
    pub fn relative_path(&self, path: &Path) -> Option<PathBuf> {
        path.strip_prefix(&self.root).ok().map(|p| p.to_path_buf())
    }
}
