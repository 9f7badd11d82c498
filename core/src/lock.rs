//! Single-runner guard.
//!
//! Two overlapping cycles can both see the same APPROVED row and send it
//! twice. The runner takes this lock before opening the store; a second
//! runner fails fast instead of racing.
//!
//! The file holds the owner's pid. A runner killed with SIGKILL leaves the
//! file behind; `LockHeld` reports that pid so an operator can confirm the
//! process is gone before deleting the file.

use crate::error::{SentinelError, SentinelResult};
use std::{
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Create the lock file exclusively. Fails with `LockHeld` if it
    /// already exists.
    pub fn acquire(path: impl AsRef<Path>) -> SentinelResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(SentinelError::LockHeld {
                    path: path.display().to_string(),
                    pid:  holder_pid(&path),
                });
            }
            Err(e) => return Err(e.into()),
        };
        writeln!(file, "{}", std::process::id())?;
        log::debug!("lock: acquired {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Pid recorded in an existing lock file, if it can be read.
fn holder_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("lock: could not remove {}: {e}", self.path.display());
        }
    }
}
