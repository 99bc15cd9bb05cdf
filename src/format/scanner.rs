//! Sweeps the designated directory

use std::fs::{self, DirEntry, Metadata};
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{FormatError, Formatter, Outcome};
use crate::domain::{classify, EntryMeta, Verdict};
use crate::storage::NonScriptPolicy;
use crate::syntax::ShellSyntax;

/// Tally of one directory sweep
#[derive(Debug, Default, Clone, Serialize)]
pub struct ScanReport {
    /// Rewritten, or would be rewritten in a dry run
    pub changed: Vec<PathBuf>,
    pub unchanged: usize,
    pub no_shebang: usize,
    pub empty_output: usize,
    /// Entries the classifier rejected
    pub skipped: Vec<PathBuf>,
    /// Entries that disappeared mid-sweep
    pub vanished: usize,
}

impl ScanReport {
    fn record(&mut self, path: PathBuf, outcome: Outcome) {
        match outcome {
            Outcome::Rewritten | Outcome::WouldRewrite => self.changed.push(path),
            Outcome::Unchanged => self.unchanged += 1,
            Outcome::NoShebang => self.no_shebang += 1,
            Outcome::EmptyOutput => self.empty_output += 1,
        }
    }

    /// Files that went through the pipeline
    pub fn examined(&self) -> usize {
        self.changed.len() + self.unchanged + self.no_shebang + self.empty_output
    }
}

impl<S: ShellSyntax> Formatter<S> {
    /// Formats every script directly inside `root`, in file-name order
    ///
    /// Subdirectories are never entered. Non-scripts are skipped or end the
    /// sweep depending on [`NonScriptPolicy`]; entries removed during the
    /// sweep are counted and passed over. Any other error ends the sweep.
    pub fn format_directory(&mut self, root: &Path) -> Result<ScanReport, FormatError> {
        let meta = fs::metadata(root).map_err(|e| FormatError::io(root, e))?;
        if !meta.is_dir() {
            return Err(FormatError::NoDirectory(root.to_path_buf()));
        }

        let mut entries = fs::read_dir(root)
            .and_then(|dir| dir.collect::<io::Result<Vec<DirEntry>>>())
            .map_err(|e| FormatError::io(root, e))?;
        entries.sort_by_key(|entry| entry.file_name());

        let mut report = ScanReport::default();

        for entry in entries {
            let path = entry.path();

            // DirEntry::metadata does not follow symlinks
            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    report.vanished += 1;
                    continue;
                }
                Err(e) => return Err(FormatError::io(&path, e)),
            };

            if meta.is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            self.visit(path, name, &meta, &mut report)?;
        }

        Ok(report)
    }

    /// Formats the given files, classifying each one like a sweep would
    pub fn format_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<ScanReport, FormatError> {
        let mut report = ScanReport::default();

        for path in paths {
            let path = path.as_ref();
            let meta = fs::symlink_metadata(path).map_err(|e| FormatError::io(path, e))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            self.visit(path.to_path_buf(), name, &meta, &mut report)?;
        }

        Ok(report)
    }

    fn visit(
        &mut self,
        path: PathBuf,
        name: String,
        meta: &Metadata,
        report: &mut ScanReport,
    ) -> Result<(), FormatError> {
        let entry = EntryMeta::from_metadata(name, meta);

        if classify(&entry, &self.settings().extensions) == Verdict::NotScript {
            return match self.settings().on_non_script {
                NonScriptPolicy::Abort => Err(FormatError::NotAShellScript(path)),
                NonScriptPolicy::Skip => {
                    report.skipped.push(path);
                    Ok(())
                }
            };
        }

        match self.format_path(&path) {
            Ok(outcome) => report.record(path, outcome),
            Err(e) if e.is_not_found() => report.vanished += 1,
            Err(e) => return Err(e),
        }
        Ok(())
    }
}
