//! Script detection
//!
//! Deciding whether a directory entry is worth opening is done from its
//! listing metadata alone. Only extension-less files large enough to hold a
//! shebang need their first bytes checked by the formatter.

use std::fs::Metadata;
use std::sync::LazyLock;

use regex::bytes::Regex as BytesRegex;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

/// Smallest file that can hold a valid shebang line (`#!/bin/sh`)
pub const MIN_SHEBANG_LEN: u64 = 8;

/// Number of leading bytes searched for the shebang
pub const SHEBANG_WINDOW: usize = 32;

static SHEBANG_RE: LazyLock<BytesRegex> = LazyLock::new(|| {
    BytesRegex::new(r"^#!\s?/(usr/)?bin/(env *)?(sh|bash)").expect("shebang pattern is valid")
});

#[derive(Debug, Error, PartialEq)]
pub enum PatternError {
    #[error("No script extensions configured")]
    Empty,

    #[error("Invalid script extension '{0}': must start with '.' and contain no other dots")]
    Invalid(String),
}

/// How likely an entry is to be a shell script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Never opened
    NotScript,
    /// No extension; a script only if its shebang says so
    IfShebang,
    /// Has a recognized script extension
    Script,
}

/// The metadata a directory listing provides for one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMeta {
    pub name: String,
    pub is_dir: bool,
    /// Plain file (not a symlink, device, fifo or socket)
    pub is_regular: bool,
    pub size: u64,
}

impl EntryMeta {
    /// Builds entry metadata from `symlink_metadata` (links are not followed)
    pub fn from_metadata(name: impl Into<String>, meta: &Metadata) -> Self {
        let file_type = meta.file_type();
        Self {
            name: name.into(),
            is_dir: file_type.is_dir(),
            is_regular: file_type.is_file(),
            size: meta.len(),
        }
    }

    /// Returns true for dotfiles
    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }

    /// Returns true if the name contains a dot
    pub fn has_extension(&self) -> bool {
        self.name.contains('.')
    }
}

/// Recognized script file extensions, e.g. `.sh` and `.bash`
#[derive(Debug, Clone)]
pub struct ScriptExtensions {
    extensions: Vec<String>,
    pattern: Regex,
}

impl ScriptExtensions {
    pub fn new<S: AsRef<str>>(extensions: &[S]) -> Result<Self, PatternError> {
        if extensions.is_empty() {
            return Err(PatternError::Empty);
        }

        let mut alternatives = Vec::with_capacity(extensions.len());
        for ext in extensions {
            let ext = ext.as_ref();
            if ext.len() < 2 || !ext.starts_with('.') || ext[1..].contains('.') {
                return Err(PatternError::Invalid(ext.to_string()));
            }
            alternatives.push(regex::escape(ext));
        }

        let pattern = Regex::new(&format!("(?:{})$", alternatives.join("|")))
            .map_err(|_| PatternError::Invalid(extensions[0].as_ref().to_string()))?;

        Ok(Self {
            extensions: extensions.iter().map(|e| e.as_ref().to_string()).collect(),
            pattern,
        })
    }

    /// Returns true if `name` ends with one of the extensions (case-sensitive)
    pub fn matches(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.extensions
    }
}

impl Default for ScriptExtensions {
    fn default() -> Self {
        Self::new(&[".sh", ".bash"]).expect("default extensions are valid")
    }
}

/// Classifies a directory entry without opening it
///
/// First match wins: directories, dotfiles (and empty names) and
/// non-regular files are never scripts; a recognized extension always is;
/// any other extension never is; extension-less files need at least
/// [`MIN_SHEBANG_LEN`] bytes to be worth a shebang check.
pub fn classify(entry: &EntryMeta, extensions: &ScriptExtensions) -> Verdict {
    if entry.is_dir || entry.name.is_empty() || entry.is_hidden() || !entry.is_regular {
        Verdict::NotScript
    } else if extensions.matches(&entry.name) {
        Verdict::Script
    } else if entry.has_extension() || entry.size < MIN_SHEBANG_LEN {
        Verdict::NotScript
    } else {
        Verdict::IfShebang
    }
}

/// Returns true if the source starts with a `sh` or `bash` shebang
///
/// Only the first [`SHEBANG_WINDOW`] bytes are inspected.
pub fn has_shell_shebang(src: &[u8]) -> bool {
    let head = &src[..src.len().min(SHEBANG_WINDOW)];
    SHEBANG_RE.is_match(head)
}
