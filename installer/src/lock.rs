//! Advisory lock serialising installs into one prefix.

use crate::stager::StageError;
use camino::{Utf8Path, Utf8PathBuf};
use fs2::FileExt;
use log::debug;
use std::fs::{self, File, OpenOptions};

/// File name of the lock inside the prefix.
pub const LOCK_FILE_NAME: &str = ".keg.lock";

/// An exclusive lock on an installation prefix, released on drop.
#[derive(Debug)]
pub struct PrefixLock {
    file: File,
    path: Utf8PathBuf,
}

impl PrefixLock {
    /// Take the lock for `prefix` without blocking, creating the prefix if
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::Locked`] if another process holds the lock, or
    /// [`StageError::Io`] if the lock file cannot be created.
    pub fn acquire(prefix: &Utf8Path) -> Result<Self, StageError> {
        fs::create_dir_all(prefix).map_err(StageError::io("create directory", prefix))?;
        let path = prefix.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(StageError::io("open lock file", &path))?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!("acquired lock {path}");
                Ok(Self { file, path })
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Err(StageError::Locked {
                path: prefix.to_owned(),
            }),
            Err(e) => Err(StageError::io("lock", &path)(e)),
        }
    }

    /// Return the lock file path.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl Drop for PrefixLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!("failed to release lock {}: {e}", self.path);
        }
    }
}
