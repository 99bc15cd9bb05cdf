//! Cross-process lock around formatting runs

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use fs2::FileExt;

/// Exclusive advisory lock, released on drop
#[derive(Debug)]
pub struct FormatLock {
    file: File,
}

impl FormatLock {
    /// Blocks until the lock at `path` is free
    pub fn acquire(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }

    /// Takes the lock only if nobody holds it
    pub fn try_acquire(path: &Path) -> io::Result<Option<Self>> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { file })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Drop for FormatLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn second_holder_is_refused() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("format.lock");

        let held = FormatLock::acquire(&path).unwrap();
        assert!(FormatLock::try_acquire(&path).unwrap().is_none());

        drop(held);
        assert!(FormatLock::try_acquire(&path).unwrap().is_some());
    }
}
