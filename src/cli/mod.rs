//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Commands
//!
//! | Command | Purpose |
//! |---------|---------|
//! | `init` | Create `.shellfmt/` and the scripts directory |
//! | `format` | Sweep the scripts directory, or format named files |
//! | `check` | Dry-run sweep; fails if anything would change |
//! | `watch` | Background session reformatting scripts as they are written |
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! Without the flag, `default_format` from the global config applies.
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug output:
//! ```bash
//! shellfmt --verbose format
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod format_cmd;
mod output;
mod watch;

pub use app::{run, Cli, Commands};
pub use output::{Output, OutputFormat};
