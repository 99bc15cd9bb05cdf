//! # Storage Layer
//!
//! Project layout, configuration and the files a watch session keeps.
//!
//! ## Project Structure
//!
//! ```text
//! .shellfmt/
//! ├── config.toml     # Project configuration
//! ├── format.lock     # Held while formatting
//! ├── watch.pid       # PID of the running watch session
//! ├── watch.log       # Session log (rotated to watch.log.1 ...)
//! └── .gitignore      # Ignores session state
//! scripts/            # Designated scripts directory (configurable)
//! ```
//!
//! ## Key Types
//!
//! - [`Project`] - Entry point for accessing a shellfmt project
//! - [`Config`] - Project and global configuration
//! - [`FormatLock`] - Serializes formatting across processes
//! - [`SessionLog`] - Watch session log

mod config;
mod lock;
mod log;
mod project;

pub use config::{
    Config, ConfigError, FormatConfig, GlobalConfig, NonScriptPolicy, OutputFormat,
    ProjectConfig, WatchConfig, WriteStrategy,
};
pub use lock::FormatLock;
pub use log::SessionLog;
pub use project::{Project, ProjectError, PROJECT_DIR};
