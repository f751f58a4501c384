//! Advisory run lock for a spec folder.
//!
//! One orchestrator per folder: the lock file is held exclusively for the
//! process lifetime and the pid file beside it names the holder.

use std::fs::OpenOptions;
use std::io::Write;

use fs2::FileExt;
use tracing::debug;

use crate::domain::errors::{OrchestrateError, OrchestrateResult};
use crate::infrastructure::process::cleanup;
use crate::infrastructure::workspace::SpecFolder;

/// Held exclusive lock on `<specFolder>/.orchestrate.lock`.
///
/// Dropping the value closes the file, which releases the lock. The pid
/// file is removed on drop; the lock file itself is left behind so a
/// re-acquire does not race a concurrent unlink.
#[derive(Debug)]
pub struct RunLock {
    // Held for the lock, never read.
    _file: std::fs::File,
    pid_path: std::path::PathBuf,
}

impl RunLock {
    /// Acquire the lock non-blockingly and write the pid file.
    pub fn acquire(folder: &SpecFolder) -> OrchestrateResult<Self> {
        // Open without truncating: the file may belong to a live holder and
        // truncation before locking would wipe its pid record.
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(folder.lock_path())?;

        file.try_lock_exclusive()
            .map_err(|_| OrchestrateError::LockContention {
                folder: folder.root().to_path_buf(),
            })?;

        let pid_path = folder.pid_path();
        let mut pid_file = std::fs::File::create(&pid_path)?;
        writeln!(pid_file, "{}", std::process::id())?;
        // Drop does not run on a signal-handler exit; the cleanup routine
        // covers the pid file there.
        cleanup::register_transient(&pid_path);

        debug!(folder = %folder.root().display(), pid = std::process::id(), "run lock acquired");
        Ok(Self {
            _file: file,
            pid_path,
        })
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.pid_path);
        cleanup::unregister_transient(&self.pid_path);
    }
}
