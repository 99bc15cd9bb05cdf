//! # Formatting
//!
//! Rewrites shell scripts in the designated directory into canonical form.
//!
//! ## Pipeline
//!
//! | Step | Result when it stops there |
//! |------|----------------------------|
//! | Open read+write (no create, no truncate) | [`FormatError::Io`] |
//! | Shebang check on the first 32 bytes | [`Outcome::NoShebang`] |
//! | Parse | [`FormatError::Parse`] |
//! | Print and compare | [`Outcome::Unchanged`] / [`Outcome::EmptyOutput`] |
//! | Write back | [`Outcome::Rewritten`] (or [`Outcome::WouldRewrite`] in a dry run) |
//!
//! A file is only written when the printed bytes differ from the original
//! and are not empty, so running the formatter twice writes nothing the
//! second time.
//!
//! ## Entry Points
//!
//! - [`Formatter::format_path`] - one file
//! - [`Formatter::format_directory`] - sweep the designated directory
//! - [`Formatter::handle_event`] / [`EventWorker`] - react to watcher events

mod formatter;
mod scanner;
mod watch;

pub use formatter::{FormatError, FormatSettings, Formatter, Outcome};
pub use scanner::ScanReport;
pub use watch::{event_channel, ChangeEvent, ChangeKind, EventWorker};
