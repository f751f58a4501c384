//! Agent exit signals and the cycle dispatch matrix.
//!
//! Every agent invocation ends with a single-word signal written to the
//! spec folder's status file. Routing is a pure function from
//! (role, signal) to a small action algebra so the whole matrix is
//! unit-testable without spawning anything.

use std::fmt;

use regex::Regex;
use std::sync::OnceLock;

/// The four agent roles the orchestrator drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentRole {
    /// Implements the next actionable task from the plan.
    DoTask,
    /// Audits the just-implemented task.
    AuditTask,
    /// Runs the demo script for the spec.
    RunDemo,
    /// Audits the whole spec and writes `audit.md`.
    AuditSpec,
}

impl AgentRole {
    /// Command name as it appears in the commands directory and in the
    /// `<command>-status:` line agents write.
    pub fn command_name(self) -> &'static str {
        match self {
            Self::DoTask => "do-task",
            Self::AuditTask => "audit-task",
            Self::RunDemo => "run-demo",
            Self::AuditSpec => "audit-spec",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command_name())
    }
}

/// A single-word exit signal reported by an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentSignal {
    Complete,
    AllDone,
    Blocked,
    Pass,
    Fail,
    Error,
    /// A well-formed word the matrix does not recognize.
    Other(String),
    /// No signal found in the status file or captured output.
    Empty,
}

impl AgentSignal {
    /// Classify a raw signal word.
    pub fn from_word(word: &str) -> Self {
        match word {
            "complete" => Self::Complete,
            "all-done" => Self::AllDone,
            "blocked" => Self::Blocked,
            "pass" => Self::Pass,
            "fail" => Self::Fail,
            "error" => Self::Error,
            other => Self::Other(other.to_string()),
        }
    }

    /// Scan text for `<command>-status: <word>` and classify the first match.
    ///
    /// Returns `None` when no status line is present, which callers fold into
    /// [`AgentSignal::Empty`] once every source has been exhausted.
    pub fn extract(command: &str, text: &str) -> Option<Self> {
        let re = status_regex();
        for caps in re.captures_iter(text) {
            if &caps[1] == command {
                return Some(Self::from_word(&caps[2]));
            }
        }
        None
    }
}

impl fmt::Display for AgentSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => f.write_str("complete"),
            Self::AllDone => f.write_str("all-done"),
            Self::Blocked => f.write_str("blocked"),
            Self::Pass => f.write_str("pass"),
            Self::Fail => f.write_str("fail"),
            Self::Error => f.write_str("error"),
            Self::Other(word) => f.write_str(word),
            Self::Empty => f.write_str("<empty>"),
        }
    }
}

fn status_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Signal word: a letter followed by word characters or dashes.
        Regex::new(r"(?m)^\s*([a-z-]+)-status:\s*([A-Za-z][A-Za-z0-9_-]*)")
            .expect("status line regex is valid")
    })
}

/// What the orchestrator does next after an agent invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleAction {
    /// Continue with the next step of the current phase.
    Proceed,
    /// Leave the task loop and move on to the spec gate.
    BreakTaskLoop,
    /// Restart the cycle from the staleness check.
    RestartCycle,
    /// Emit a warning, then continue with the next step.
    WarnAndProceed(&'static str),
    /// Stop: the agent asked for human intervention.
    AbortBlocked,
    /// Stop: the agent reported an unrecoverable error.
    AbortError,
}

/// The signal interpretation matrix.
///
/// `audit-spec` is absent on purpose: its outcome is read from the
/// `status:` header of `audit.md`, never from its exit signal.
pub fn dispatch(role: AgentRole, signal: &AgentSignal) -> CycleAction {
    match role {
        AgentRole::DoTask => match signal {
            AgentSignal::Complete => CycleAction::Proceed,
            AgentSignal::AllDone => CycleAction::BreakTaskLoop,
            AgentSignal::Blocked => CycleAction::AbortBlocked,
            AgentSignal::Error => CycleAction::AbortError,
            AgentSignal::Empty => {
                CycleAction::WarnAndProceed("no status signal; relying on the task gate")
            }
            _ => CycleAction::WarnAndProceed("unrecognized do-task signal"),
        },
        AgentRole::AuditTask => match signal {
            AgentSignal::Pass | AgentSignal::Fail => CycleAction::Proceed,
            AgentSignal::Error => CycleAction::AbortError,
            _ => CycleAction::WarnAndProceed("unrecognized audit-task signal"),
        },
        AgentRole::RunDemo => match signal {
            AgentSignal::Pass => CycleAction::Proceed,
            AgentSignal::Fail => CycleAction::RestartCycle,
            AgentSignal::Error | AgentSignal::Empty => CycleAction::AbortError,
            _ => CycleAction::WarnAndProceed("unrecognized run-demo signal"),
        },
        AgentRole::AuditSpec => CycleAction::Proceed,
    }
}
