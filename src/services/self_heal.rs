//! Repairable drifts: spec mutation and checkbox drift.
//!
//! Philosophy: repair small artifact drifts instead of failing the run.
//! Exactly two conditions are repairable: an agent mutated `spec.md`
//! (revert from backup, amend the commit away), or an audited task's
//! checkbox stayed unchecked (tick it, amend or add a bookkeeping commit).
//! Everything else is an abort handled by the orchestrator.

use std::path::Path;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::domain::errors::OrchestrateResult;
use crate::infrastructure::process::cleanup;
use crate::infrastructure::workspace::{Fingerprint, SpecFolder};

/// Watches `spec.md` for agent-inflicted changes.
#[derive(Debug)]
pub struct SpecGuard {
    baseline: Fingerprint,
}

impl SpecGuard {
    /// Snapshot the spec's fingerprint and write the byte-for-byte backup.
    pub fn capture(folder: &SpecFolder) -> OrchestrateResult<Self> {
        folder.backup_spec()?;
        cleanup::register_transient(&folder.spec_backup_path());
        let baseline = Fingerprint::of_file(&folder.spec_path());
        debug!(%baseline, "spec fingerprint captured");
        Ok(Self { baseline })
    }

    /// Re-check the spec after an agent ran; revert and amend on mutation.
    ///
    /// Returns whether a repair happened, so the caller can render the
    /// warning. The amend is best effort: there may be no commit yet, or no
    /// repository at all.
    pub async fn enforce(&self, folder: &SpecFolder) -> OrchestrateResult<bool> {
        let current = Fingerprint::of_file(&folder.spec_path());
        if current == self.baseline {
            return Ok(false);
        }

        warn!(
            was = %self.baseline,
            now = %current,
            "spec.md was mutated by an agent; reverting"
        );
        folder.restore_spec()?;
        git(folder.root(), &["add", "spec.md"]).await;
        git(folder.root(), &["commit", "--amend", "--no-edit"]).await;
        Ok(true)
    }

    /// Remove the backup file on shutdown.
    pub fn discard(&self, folder: &SpecFolder) {
        let backup = folder.spec_backup_path();
        let _ = std::fs::remove_file(&backup);
        cleanup::unregister_transient(&backup);
    }
}

/// Tick the checkbox of a task the audit passed but the agent forgot.
///
/// Returns whether the plan changed. Idempotent: a plan that already shows
/// `[x]` for the label is left untouched.
pub async fn heal_checkboxes(folder: &SpecFolder, label: &str) -> OrchestrateResult<bool> {
    let plan = folder.read_plan()?;
    let Some(healed) = plan.check_off(label) else {
        return Ok(false);
    };

    std::fs::write(folder.plan_path(), healed)?;
    warn!(label, "checkbox left unticked after audit pass; repaired");

    git(folder.root(), &["add", "plan.md"]).await;
    if !git(folder.root(), &["commit", "--amend", "--no-edit"]).await {
        // No commit to amend; record the bookkeeping separately.
        git(
            folder.root(),
            &["commit", "-m", "orchestrate: tick completed task checkboxes"],
        )
        .await;
    }
    Ok(true)
}

/// Run a git subcommand in the spec folder's repository, best effort.
async fn git(cwd: &Path, args: &[&str]) -> bool {
    match Command::new("git")
        .arg("-C")
        .arg(cwd)
        .args(args)
        .output()
        .await
    {
        Ok(output) => {
            if !output.status.success() {
                debug!(
                    args = args.join(" "),
                    stderr = %String::from_utf8_lossy(&output.stderr).trim_end(),
                    "git command failed (ignored)"
                );
            }
            output.status.success()
        }
        Err(e) => {
            debug!(args = args.join(" "), error = %e, "git unavailable (ignored)");
            false
        }
    }
}
