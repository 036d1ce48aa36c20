//! Shared data files.
//!
//! Every CLI invocation is its own process, so the audit log and the
//! session file can be written by several processes at once. Writers hold
//! an exclusive advisory lock on a `<file>.lock` sidecar while they
//! read, modify and replace the data file. The data file itself is only
//! ever replaced by renaming a fully written temp file over it, so readers
//! never need the lock.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tempfile::NamedTempFile;

/// Exclusive lock guarding one data file. Released on drop.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Block until this handle holds the lock for `target`.
    pub fn exclusive(target: &Path) -> io::Result<Self> {
        ensure_parent(target)?;
        let path = lock_path(target);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        FileExt::lock_exclusive(&file)?;
        Ok(Self { file, path })
    }

    /// Path of the sidecar lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::debug!(path = %self.path.display(), error = %e, "Failed to release file lock");
        }
    }
}

/// `<target>.lock`, next to the data file.
pub fn lock_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(OsString::from).unwrap_or_default();
    name.push(".lock");
    target.with_file_name(name)
}

/// Replace `target` with `contents` in one rename.
///
/// The temp file gets a unique name in the same directory, so concurrent
/// writers never share one.
pub fn write_atomic(target: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = ensure_parent(target)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

fn ensure_parent(target: &Path) -> io::Result<&Path> {
    match target.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent)?;
            Ok(parent)
        }
        None => Ok(Path::new(".")),
    }
}
