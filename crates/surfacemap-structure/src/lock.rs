//! Advisory lock guarding a catalog against concurrent consolidation
//!
//! The lock file holds the PID of its owner. A lock left behind by a process
//! that no longer exists, or one older than `STALE_AFTER`, is taken over.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use surfacemap_core::{Error, Result};
use tracing::{debug, warn};

/// Age after which a lock is considered abandoned whatever its contents
pub const STALE_AFTER: Duration = Duration::from_secs(60 * 60);

/// Held for the lifetime of one consolidation; removes the lock file on drop
#[derive(Debug)]
pub struct CatalogLock {
    path: PathBuf,
}

impl CatalogLock {
    /// Lock file path for a catalog (`structure.json` -> `structure.json.lock`)
    pub fn lock_path(catalog: &Path) -> PathBuf {
        let mut name = catalog.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Take the lock, failing with `Locked` if a live holder exists
    pub fn acquire(catalog: &Path) -> Result<Self> {
        let path = Self::lock_path(catalog);

        match Self::create(&path) {
            Err(Error::Locked { .. }) if is_stale(&path) => {
                warn!("Taking over stale lock {}", path.display());
                match std::fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                // A racing process may win the takeover; that is a plain `Locked`
                Self::create(&path)
            }
            other => other,
        }
    }

    fn create(path: &Path) -> Result<Self> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(Error::Locked {
                    path: path.display().to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        // From here on the guard owns the file, so a failed write still removes it
        let lock = Self {
            path: path.to_path_buf(),
        };
        writeln!(file, "{}", std::process::id())?;
        debug!("Acquired {}", path.display());
        Ok(lock)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CatalogLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("Failed to remove lock {}: {}", self.path.display(), e);
        }
    }
}

/// Whether the lock at `path` was abandoned by its owner
fn is_stale(path: &Path) -> bool {
    let age = std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok());
    if age.is_some_and(|age| age > STALE_AFTER) {
        return true;
    }

    // An empty file may belong to an owner that has not written its PID yet
    match std::fs::read_to_string(path)
        .ok()
        .and_then(|content| content.trim().parse::<u32>().ok())
    {
        Some(pid) => process_exited(pid),
        None => false,
    }
}

#[cfg(target_os = "linux")]
fn process_exited(pid: u32) -> bool {
    !Path::new("/proc").join(pid.to_string()).exists()
}

/// Without procfs liveness is unknown; only the age bound applies
#[cfg(not(target_os = "linux"))]
fn process_exited(_pid: u32) -> bool {
    false
}
