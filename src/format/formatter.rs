//! Single-file rewrite pipeline

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::domain::{has_shell_shebang, PatternError, ScriptExtensions};
use crate::storage::{FormatConfig, NonScriptPolicy, WriteStrategy};
use crate::syntax::{ParseError, ParseMode, PrintConfig, Shell, ShellSyntax};

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("File is not a shell script: {}", .0.display())]
    NotAShellScript(PathBuf),

    #[error("Not a directory: {}", .0.display())]
    NoDirectory(PathBuf),

    #[error("{}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl FormatError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        FormatError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Returns true if the file disappeared before it could be read
    pub fn is_not_found(&self) -> bool {
        matches!(self, FormatError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

/// What [`Formatter::format_path`] did with a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Written back in canonical form
    Rewritten,
    /// Already canonical
    Unchanged,
    /// No `sh`/`bash` shebang; left alone
    NoShebang,
    /// The printer produced nothing; left alone
    EmptyOutput,
    /// Would have been rewritten (dry run)
    WouldRewrite,
}

impl Outcome {
    pub fn as_str(&self) -> &str {
        match self {
            Outcome::Rewritten => "rewritten",
            Outcome::Unchanged => "unchanged",
            Outcome::NoShebang => "no_shebang",
            Outcome::EmptyOutput => "empty_output",
            Outcome::WouldRewrite => "would_rewrite",
        }
    }
}

/// Knobs that stay fixed for a formatting session
#[derive(Debug, Clone, Default)]
pub struct FormatSettings {
    pub extensions: ScriptExtensions,
    pub parse_mode: ParseMode,
    pub on_non_script: NonScriptPolicy,
    pub write_strategy: WriteStrategy,
    /// Report changes without writing them
    pub dry_run: bool,
}

impl FormatSettings {
    pub fn from_config(config: &FormatConfig) -> Result<Self, PatternError> {
        Ok(Self {
            extensions: ScriptExtensions::new(&config.extensions)?,
            parse_mode: ParseMode {
                keep_comments: config.keep_comments,
            },
            on_non_script: config.on_non_script,
            write_strategy: config.write_strategy,
            dry_run: false,
        })
    }
}

/// Formats scripts, reusing its buffers from one file to the next
///
/// Every entry point takes `&mut self`; share a formatter between threads
/// by handing it to an [`EventWorker`](super::EventWorker).
pub struct Formatter<S: ShellSyntax = Shell> {
    read_buf: Vec<u8>,
    write_buf: Vec<u8>,
    settings: FormatSettings,
    syntax: S,
}

impl Formatter<Shell> {
    /// Builds a formatter with the built-in syntax
    pub fn from_config(config: &FormatConfig) -> Result<Self, PatternError> {
        let settings = FormatSettings::from_config(config)?;
        let syntax = Shell::new(PrintConfig {
            indent: config.indent,
            space_redirects: config.space_redirects,
        });
        Ok(Self::new(settings, syntax))
    }
}

impl<S: ShellSyntax> Formatter<S> {
    pub fn new(settings: FormatSettings, syntax: S) -> Self {
        Self {
            read_buf: Vec::new(),
            write_buf: Vec::new(),
            settings,
            syntax,
        }
    }

    pub fn settings(&self) -> &FormatSettings {
        &self.settings
    }

    pub fn syntax(&self) -> &S {
        &self.syntax
    }

    pub fn set_dry_run(&mut self, dry_run: bool) {
        self.settings.dry_run = dry_run;
    }

    /// Runs one file through the pipeline
    ///
    /// The file is left untouched unless the result is
    /// [`Outcome::Rewritten`].
    pub fn format_path(&mut self, path: &Path) -> Result<Outcome, FormatError> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| FormatError::io(path, e))?;

        self.read_buf.clear();
        file.read_to_end(&mut self.read_buf)
            .map_err(|e| FormatError::io(path, e))?;

        if !has_shell_shebang(&self.read_buf) {
            return Ok(Outcome::NoShebang);
        }

        let name = path.to_string_lossy();
        let tree = self
            .syntax
            .parse(&self.read_buf, &name, self.settings.parse_mode)?;

        self.write_buf.clear();
        self.syntax.print(&mut self.write_buf, &tree);

        if self.write_buf.is_empty() {
            return Ok(Outcome::EmptyOutput);
        }
        if self.write_buf == self.read_buf {
            return Ok(Outcome::Unchanged);
        }
        if self.settings.dry_run {
            return Ok(Outcome::WouldRewrite);
        }

        let written = match self.settings.write_strategy {
            WriteStrategy::InPlace => overwrite(&mut file, &self.write_buf),
            WriteStrategy::Atomic => replace(path, &file, &self.write_buf),
        };
        written.map_err(|e| FormatError::io(path, e))?;

        Ok(Outcome::Rewritten)
    }
}

/// Truncates the open file and writes `contents` from the start
fn overwrite(file: &mut File, contents: &[u8]) -> io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(contents)?;
    file.flush()
}

/// Swaps `contents` in through a sibling temp file
fn replace(path: &Path, original: &File, contents: &[u8]) -> io::Result<()> {
    let temp_path = temp_path_for(path);
    let permissions = original.metadata()?.permissions();

    let result = write_temp(&temp_path, contents, permissions)
        .and_then(|()| fs::rename(&temp_path, path));
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn write_temp(temp_path: &Path, contents: &[u8], permissions: fs::Permissions) -> io::Result<()> {
    let mut temp = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(temp_path)?;
    temp.write_all(contents)?;
    temp.sync_all()?;
    fs::set_permissions(temp_path, permissions)
}

/// `dir/name.sh` becomes `dir/.name.sh.shellfmt-tmp`, hidden from sweeps
fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.shellfmt-tmp"))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Syntax whose printer always produces nothing
    pub(crate) struct Blank;

    impl ShellSyntax for Blank {
        type Tree = ();

        fn parse(&self, _: &[u8], _: &str, _: ParseMode) -> Result<(), ParseError> {
            Ok(())
        }

        fn print(&self, _: &mut Vec<u8>, _: &()) {}
    }

    /// Syntax that echoes its input and counts parse calls
    #[derive(Default)]
    pub(crate) struct Counting {
        parses: AtomicUsize,
    }

    impl Counting {
        pub(crate) fn parses(&self) -> usize {
            self.parses.load(Ordering::SeqCst)
        }
    }

    impl ShellSyntax for Counting {
        type Tree = Vec<u8>;

        fn parse(&self, src: &[u8], _: &str, _: ParseMode) -> Result<Vec<u8>, ParseError> {
            self.parses.fetch_add(1, Ordering::SeqCst);
            Ok(src.to_vec())
        }

        fn print(&self, out: &mut Vec<u8>, tree: &Vec<u8>) {
            out.extend_from_slice(tree);
        }
    }

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn formatter() -> Formatter {
        Formatter::from_config(&FormatConfig::default()).unwrap()
    }

    #[test]
    fn rewrites_messy_script() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "build.sh", "#!/bin/bash\n\n  echo   \"hi\"\n");

        let outcome = formatter().format_path(&path).unwrap();

        assert_eq!(outcome, Outcome::Rewritten);
        assert_eq!(fs::read_to_string(&path).unwrap(), "#!/bin/bash\n\necho \"hi\"\n");
    }

    #[test]
    fn second_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "deploy.sh",
            "#!/bin/sh\nif true; then\necho yes\nfi\n\n\n\nexit 0\n",
        );
        let mut formatter = formatter();

        assert_eq!(formatter.format_path(&path).unwrap(), Outcome::Rewritten);
        let first = fs::read(&path).unwrap();
        let modified = fs::metadata(&path).unwrap().modified().unwrap();

        assert_eq!(formatter.format_path(&path).unwrap(), Outcome::Unchanged);
        assert_eq!(fs::read(&path).unwrap(), first);
        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), modified);
    }

    #[test]
    fn missing_shebang_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "notes.sh", "echo   hi\n");

        assert_eq!(formatter().format_path(&path).unwrap(), Outcome::NoShebang);
        assert_eq!(fs::read_to_string(&path).unwrap(), "echo   hi\n");
    }

    #[test]
    fn python_shebang_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "tool", "#!/usr/bin/env python3\nprint(  1 )\n");

        assert_eq!(formatter().format_path(&path).unwrap(), Outcome::NoShebang);
    }

    #[test]
    fn parse_failure_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let source = "#!/bin/sh\necho 'unterminated\n  ls\n";
        let path = write(&dir, "broken.sh", source);

        let err = formatter().format_path(&path).unwrap_err();

        assert!(matches!(err, FormatError::Parse(_)));
        assert_eq!(fs::read_to_string(&path).unwrap(), source);
    }

    #[test]
    fn empty_output_is_never_written() {
        let dir = TempDir::new().unwrap();
        let source = "#!/bin/sh\necho   hi\n";
        let path = write(&dir, "run.sh", source);
        let mut formatter = Formatter::new(FormatSettings::default(), Blank);

        assert_eq!(formatter.format_path(&path).unwrap(), Outcome::EmptyOutput);
        assert_eq!(fs::read_to_string(&path).unwrap(), source);
    }

    #[test]
    fn extensionless_env_bash_script() {
        let dir = TempDir::new().unwrap();
        // 40 bytes, no extension
        let source = "#!/usr/bin/env bash\nls   -la\necho   ok\n\n";
        assert_eq!(source.len(), 40);
        let path = write(&dir, "release", source);

        assert_eq!(formatter().format_path(&path).unwrap(), Outcome::Rewritten);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "#!/usr/bin/env bash\nls -la\necho ok\n"
        );
    }

    #[test]
    fn shrinking_rewrite_leaves_no_tail() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "pad.sh", "#!/bin/sh\necho          a          b\n\n\n\n");

        formatter().format_path(&path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "#!/bin/sh\necho a b\n");
    }

    #[test]
    fn dry_run_reports_without_writing() {
        let dir = TempDir::new().unwrap();
        let source = "#!/bin/sh\necho   hi\n";
        let path = write(&dir, "run.sh", source);
        let mut formatter = formatter();
        formatter.set_dry_run(true);

        assert_eq!(formatter.format_path(&path).unwrap(), Outcome::WouldRewrite);
        assert_eq!(fs::read_to_string(&path).unwrap(), source);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = formatter()
            .format_path(&dir.path().join("gone.sh"))
            .unwrap_err();

        assert!(err.is_not_found());
    }

    #[test]
    fn canonical_input_skips_printer_write() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "same.sh", "#!/bin/sh\necho hi\n");
        let mut formatter = Formatter::new(FormatSettings::default(), Counting::default());

        assert_eq!(formatter.format_path(&path).unwrap(), Outcome::Unchanged);
        assert_eq!(formatter.syntax().parses(), 1);
    }

    #[test]
    fn atomic_strategy_replaces_file() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "swap.sh", "#!/bin/sh\necho   hi\n");
        let config = FormatConfig {
            write_strategy: WriteStrategy::Atomic,
            ..FormatConfig::default()
        };
        let mut formatter = Formatter::from_config(&config).unwrap();

        assert_eq!(formatter.format_path(&path).unwrap(), Outcome::Rewritten);
        assert_eq!(fs::read_to_string(&path).unwrap(), "#!/bin/sh\necho hi\n");
        assert!(!dir.path().join(".swap.sh.shellfmt-tmp").exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn atomic_strategy_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = write(&dir, "exec.sh", "#!/bin/sh\necho   hi\n");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o754)).unwrap();
        let config = FormatConfig {
            write_strategy: WriteStrategy::Atomic,
            ..FormatConfig::default()
        };

        Formatter::from_config(&config)
            .unwrap()
            .format_path(&path)
            .unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o754);
    }

    #[test]
    fn comments_dropped_when_configured() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "c.sh", "#!/bin/sh\n# note\necho hi # inline\n");
        let config = FormatConfig {
            keep_comments: false,
            ..FormatConfig::default()
        };

        Formatter::from_config(&config)
            .unwrap()
            .format_path(&path)
            .unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "#!/bin/sh\necho hi\n");
    }

    #[test]
    fn temp_name_is_hidden_sibling() {
        assert_eq!(
            temp_path_for(Path::new("/x/scripts/a.sh")),
            PathBuf::from("/x/scripts/.a.sh.shellfmt-tmp")
        );
    }
}
