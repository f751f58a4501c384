//! Typed access to the files of one spec folder.
//!
//! The folder itself preexists and is never created or destroyed here; the
//! orchestrator only owns its transient files (status, lock, pid, backup).

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::domain::errors::{OrchestrateError, OrchestrateResult};
use crate::domain::models::TaskPlan;

/// One feature's artifact directory.
#[derive(Debug, Clone)]
pub struct SpecFolder {
    root: PathBuf,
}

impl SpecFolder {
    /// Wrap a directory path without touching the filesystem.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Verify the startup preconditions: the folder, `spec.md`, and
    /// `plan.md` must all exist.
    pub fn validate(&self) -> OrchestrateResult<()> {
        if !self.root.is_dir() {
            return Err(OrchestrateError::Config(format!(
                "spec folder not found: {}",
                self.root.display()
            )));
        }
        for required in ["spec.md", "plan.md"] {
            if !self.root.join(required).is_file() {
                return Err(OrchestrateError::Config(format!(
                    "missing {} in {}",
                    required,
                    self.root.display()
                )));
            }
        }
        Ok(())
    }

    /// The folder path itself.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn spec_path(&self) -> PathBuf {
        self.root.join("spec.md")
    }

    pub fn plan_path(&self) -> PathBuf {
        self.root.join("plan.md")
    }

    pub fn audit_path(&self) -> PathBuf {
        self.root.join("audit.md")
    }

    pub fn signposts_path(&self) -> PathBuf {
        self.root.join("signposts.md")
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.root.join("audit-log.md")
    }

    pub fn status_path(&self) -> PathBuf {
        self.root.join(".agent-status")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(".orchestrate.lock")
    }

    pub fn pid_path(&self) -> PathBuf {
        self.root.join(".orchestrate.pid")
    }

    /// Where the startup byte-for-byte copy of `spec.md` lives.
    pub fn spec_backup_path(&self) -> PathBuf {
        self.root.join(".orchestrate.spec.bak")
    }

    /// Load the current plan content.
    pub fn read_plan(&self) -> OrchestrateResult<TaskPlan> {
        let content = std::fs::read_to_string(self.plan_path())?;
        Ok(TaskPlan::new(content))
    }

    /// Read the agent status file, if present.
    pub fn read_status(&self) -> Option<String> {
        std::fs::read_to_string(self.status_path()).ok()
    }

    /// Remove the agent status file; called before every agent invocation.
    pub fn clear_status(&self) -> OrchestrateResult<()> {
        match std::fs::remove_file(self.status_path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Snapshot `spec.md` into the backup file.
    pub fn backup_spec(&self) -> OrchestrateResult<()> {
        std::fs::copy(self.spec_path(), self.spec_backup_path())?;
        Ok(())
    }

    /// Overwrite `spec.md` from the backup file.
    pub fn restore_spec(&self) -> OrchestrateResult<()> {
        std::fs::copy(self.spec_backup_path(), self.spec_path())?;
        Ok(())
    }

    /// Modification time of `audit.md`, if the file exists.
    pub fn audit_mtime(&self) -> Option<SystemTime> {
        std::fs::metadata(self.audit_path())
            .and_then(|m| m.modified())
            .ok()
    }
}
