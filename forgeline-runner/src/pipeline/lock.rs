//! Advisory lock on a checkpoint file
//!
//! Uses `flock` on a sibling `<state file>.lock` so two pipeline runs
//! against the same checkpoint fail fast instead of racing.

use crate::error::StateError;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Exclusive lock guard, released on drop or process exit
#[derive(Debug)]
pub struct StateLock {
    #[allow(dead_code)] // held for its lifetime
    file: File,
    path: PathBuf,
}

/// Lock file path for a checkpoint path
pub fn lock_path_for(state_path: &Path) -> PathBuf {
    let mut name = state_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    state_path.with_file_name(name)
}

impl StateLock {
    /// Attempts to take the lock without blocking
    ///
    /// # Arguments
    /// * `state_path` - The checkpoint file being protected
    ///
    /// # Returns
    /// * `Ok(StateLock)` - Lock acquired
    /// * `Err(StateError::Locked)` - Another run holds it
    pub fn acquire(state_path: &Path) -> Result<Self, StateError> {
        let lock_path = lock_path_for(state_path);
        let io_err = |source| StateError::Io {
            path: lock_path.clone(),
            source,
        };

        if let Some(parent) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(io_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;

            let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
            if result != 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::WouldBlock {
                    return Err(StateError::Locked {
                        path: state_path.to_path_buf(),
                        lock_path,
                    });
                }
                return Err(io_err(err));
            }
        }

        #[cfg(not(unix))]
        tracing::debug!("Advisory locking unavailable on this platform, continuing unlocked");

        tracing::debug!(lock_path = %lock_path.display(), "Acquired state lock");
        Ok(Self {
            file,
            path: lock_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            unsafe {
                libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
            }
        }

        tracing::debug!(lock_path = %self.path.display(), "Released state lock");
    }
}
