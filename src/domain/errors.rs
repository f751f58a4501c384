//! Error taxonomy for the orchestrator and standards auditor.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop an orchestrator or auditor run.
///
/// Recoverable drifts (spec mutation, checkbox drift, gate retries within
/// budget) are repaired in place and never appear here.
#[derive(Debug, Error)]
pub enum OrchestrateError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("another orchestrator already holds the lock on {}", folder.display())]
    LockContention { folder: PathBuf },

    #[error("agent '{command}' failed: {detail}")]
    AgentFailed { command: String, detail: String },

    #[error(
        "agent '{command}' is blocked and needs human intervention; see {}",
        signposts.display()
    )]
    AgentBlocked { command: String, signposts: PathBuf },

    #[error("gate '{gate}' still failing after {attempts} attempts")]
    GateFailure {
        gate: String,
        attempts: u32,
        output: String,
    },

    #[error(
        "plan unchanged for {cycles} consecutive cycles; review {} and {}",
        signposts.display(),
        audit_log.display()
    )]
    Stale {
        cycles: u32,
        signposts: PathBuf,
        audit_log: PathBuf,
    },

    #[error("task stuck: '{label}' attempted {attempts} times without progress")]
    TaskStuck { label: String, attempts: u32 },

    #[error("plan reports actionable tasks but none could be found in {}", plan.display())]
    NoActionableTask { plan: PathBuf },

    #[error("audit-spec did not update {}", audit.display())]
    AuditStale { audit: PathBuf },

    #[error("unrecognized audit status '{status}' in {}", audit.display())]
    UnknownAuditStatus { status: String, audit: PathBuf },

    #[error("no spec-audit pass within {max_cycles} cycles")]
    CycleLimit { max_cycles: u32 },

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("interrupted by signal")]
    Interrupted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the crate.
pub type OrchestrateResult<T> = Result<T, OrchestrateError>;

impl OrchestrateError {
    /// Process exit code for this stop condition.
    ///
    /// Config and lock problems exit 2 (nothing was attempted yet); an
    /// interrupt exits 130; every other abort exits 1. Success is exit 0 and
    /// never reaches this function.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::LockContention { .. } => 2,
            Self::Interrupted => 130,
            _ => 1,
        }
    }
}
