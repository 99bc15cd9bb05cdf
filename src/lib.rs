//! shellfmt - Keeps the shell scripts of a project in canonical form
//!
//! Scripts live in one designated directory. shellfmt sweeps that
//! directory on demand, or watches it and reformats each script as soon as
//! it is written.

pub mod domain;
pub mod syntax;
pub mod format;
pub mod storage;
pub mod cli;

pub use domain::{classify, EntryMeta, Verdict};
pub use format::{FormatError, Formatter, Outcome, ScanReport};
