//! Session log for watch mode
//!
//! Lines look like `[2024-05-01 12:00:00] Formatted scripts/build.sh`.
//! The file is rotated once it passes [`MAX_LOG_SIZE`].

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Maximum log file size before rotation (1MB)
pub const MAX_LOG_SIZE: u64 = 1024 * 1024;

/// Number of log files to keep
pub const LOG_ROTATION_COUNT: usize = 7;

/// Append-only log of a watch session
#[derive(Debug, Clone)]
pub struct SessionLog {
    path: PathBuf,
}

impl SessionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends a timestamped line
    pub fn write(&self, message: &str) -> Result<()> {
        self.rotate_if_needed()?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open log file: {}", self.path.display()))?;

        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(file, "[{}] {}", timestamp, message)?;

        Ok(())
    }

    /// Reads the last `count` lines
    pub fn tail(&self, count: usize) -> Result<(Vec<String>, usize)> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read log file: {}", self.path.display()))?;
        let all: Vec<&str> = content.lines().collect();
        let start = all.len().saturating_sub(count);

        Ok((all[start..].iter().map(|s| s.to_string()).collect(), all.len()))
    }

    fn rotated(&self, index: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    fn rotate_if_needed(&self) -> Result<()> {
        let metadata = match fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(_) => return Ok(()),
        };
        if metadata.len() < MAX_LOG_SIZE {
            return Ok(());
        }

        // Shift numbered logs up, dropping the oldest
        for i in (1..LOG_ROTATION_COUNT).rev() {
            let old_path = self.rotated(i);
            if old_path.exists() {
                if i + 1 >= LOG_ROTATION_COUNT {
                    fs::remove_file(&old_path)?;
                } else {
                    fs::rename(&old_path, self.rotated(i + 1))?;
                }
            }
        }

        fs::rename(&self.path, self.rotated(1))?;

        Ok(())
    }
}
