//! Domain models for shellfmt
//!
//! Contains the classification rules without any I/O concerns.

mod classify;

pub use classify::{
    classify, has_shell_shebang, EntryMeta, PatternError, ScriptExtensions, Verdict,
    MIN_SHEBANG_LEN, SHEBANG_WINDOW,
};
