//! The cycle state machine.
//!
//! One run drives a single spec folder through repeated cycles of
//! {task loop, spec gate, demo, spec audit} until the spec audit passes or
//! a stop condition fires. The business logic is deliberately sequential:
//! the only concurrency is the subprocess currently awaited, the spinner
//! ticker, and the signal handlers.

use std::time::Duration;

use tracing::{info, warn};

use crate::cli::output::ProgressReporter;
use crate::domain::errors::{OrchestrateError, OrchestrateResult};
use crate::domain::models::audit::{self, AuditStatus};
use crate::domain::models::signal::{dispatch, AgentRole, AgentSignal, CycleAction};
use crate::domain::models::OrchestratorConfig;
use crate::infrastructure::process::{cleanup, CommandSpec, ProcessRunner, RunOutcome};
use crate::infrastructure::workspace::{Fingerprint, SpecFolder};
use crate::services::agent_invoker::{AgentInvoker, AgentOutcome};
use crate::services::self_heal::{self, SpecGuard};

/// Re-invocations of do-task allowed per task when its gate keeps failing.
const MAX_GATE_RETRIES: u32 = 3;

/// Pause between a failed gate and the retry invocation.
const GATE_RETRY_GRACE: Duration = Duration::from_secs(1);

/// Characters of agent output surfaced when an agent errors out.
const OUTPUT_TAIL_CHARS: usize = 2000;

/// Characters of gate output fed back into a retry prompt.
const GATE_CONTEXT_CHARS: usize = 4000;

/// Per-run mutable state, reset for every `run` call.
#[derive(Debug)]
struct CycleState {
    plan_fingerprint: Fingerprint,
    stale_count: u32,
    had_tasks: bool,
    prev_task_label: Option<String>,
    task_attempts: u32,
}

impl CycleState {
    fn new() -> Self {
        Self {
            plan_fingerprint: Fingerprint::absent(),
            stale_count: 0,
            had_tasks: false,
            prev_task_label: None,
            task_attempts: 0,
        }
    }
}

/// Outcome of one gate run.
struct GateRun {
    success: bool,
    output: String,
}

/// Drives one spec folder to a passing spec audit.
pub struct Orchestrator {
    folder: SpecFolder,
    config: OrchestratorConfig,
    invoker: AgentInvoker,
    runner: ProcessRunner,
    ui: ProgressReporter,
}

impl Orchestrator {
    /// Build an orchestrator for a validated spec folder.
    pub fn new(folder: SpecFolder, config: OrchestratorConfig) -> Self {
        let invoker = AgentInvoker::new(&config);
        Self {
            folder,
            config,
            invoker,
            runner: ProcessRunner,
            ui: ProgressReporter::new(),
        }
    }

    /// Run cycles until the spec audit passes or a stop condition fires.
    pub async fn run(&mut self) -> OrchestrateResult<()> {
        self.folder.validate()?;
        let guard = SpecGuard::capture(&self.folder)?;
        cleanup::register_transient(&self.folder.status_path());

        let result = self.run_cycles(&guard).await;

        guard.discard(&self.folder);
        let _ = self.folder.clear_status();

        if result.is_ok() {
            play_completion_sound();
            self.ui.summary("spec audit passed");
        }
        result
    }

    async fn run_cycles(&mut self, guard: &SpecGuard) -> OrchestrateResult<()> {
        let mut state = CycleState::new();

        'cycles: for cycle in 1..=self.config.max_cycles {
            self.check_interrupted()?;

            // Staleness is only meaningful once the run has seen work.
            let fingerprint = Fingerprint::of_file(&self.folder.plan_path());
            if state.had_tasks && fingerprint == state.plan_fingerprint {
                state.stale_count += 1;
                if state.stale_count >= self.config.stale_limit {
                    return Err(OrchestrateError::Stale {
                        cycles: state.stale_count,
                        signposts: self.folder.signposts_path(),
                        audit_log: self.folder.audit_log_path(),
                    });
                }
            } else {
                state.stale_count = 0;
            }
            state.plan_fingerprint = fingerprint;

            let remaining = self.folder.read_plan()?.actionable_count();
            if remaining > 0 {
                state.had_tasks = true;
            }
            self.ui
                .section(&format!("Cycle {cycle} - {remaining} tasks remaining"));
            info!(cycle, remaining, stale = state.stale_count, "cycle started");

            // ================================================================
            // Phase 1: task loop
            // ================================================================
            'tasks: loop {
                let plan = self.folder.read_plan()?;
                if plan.actionable_count() == 0 {
                    break 'tasks;
                }
                let Some(label) = plan.next_task_label() else {
                    return Err(OrchestrateError::NoActionableTask {
                        plan: self.folder.plan_path(),
                    });
                };

                if state.prev_task_label.as_deref() == Some(label.as_str()) {
                    state.task_attempts += 1;
                } else {
                    state.prev_task_label = Some(label.clone());
                    state.task_attempts = 1;
                }
                if state.task_attempts > self.config.max_task_retries {
                    return Err(OrchestrateError::TaskStuck {
                        label,
                        attempts: state.task_attempts,
                    });
                }
                info!(task = %label, attempt = state.task_attempts, "working task");

                let outcome = self.invoke(guard, AgentRole::DoTask, None).await?;
                match dispatch(AgentRole::DoTask, &outcome.signal) {
                    CycleAction::Proceed => {}
                    CycleAction::BreakTaskLoop => {
                        self.ui.plain("agent reports all tasks done");
                        break 'tasks;
                    }
                    CycleAction::RestartCycle => continue 'cycles,
                    CycleAction::WarnAndProceed(msg) => self.ui.warn(msg),
                    CycleAction::AbortBlocked => return Err(self.blocked(AgentRole::DoTask)),
                    CycleAction::AbortError => {
                        return Err(self.agent_error(AgentRole::DoTask, &outcome))
                    }
                }

                self.run_task_gate(guard).await?;

                let outcome = self.invoke(guard, AgentRole::AuditTask, None).await?;
                match dispatch(AgentRole::AuditTask, &outcome.signal) {
                    CycleAction::Proceed => {}
                    CycleAction::RestartCycle => continue 'cycles,
                    CycleAction::BreakTaskLoop => break 'tasks,
                    CycleAction::WarnAndProceed(msg) => self.ui.warn(msg),
                    CycleAction::AbortBlocked => return Err(self.blocked(AgentRole::AuditTask)),
                    CycleAction::AbortError => {
                        return Err(self.agent_error(AgentRole::AuditTask, &outcome))
                    }
                }

                if outcome.signal == AgentSignal::Pass && !self.heal_after_pass(&label).await? {
                    // The checkbox is still unticked and cannot be repaired;
                    // leave the loop so the cycle-level staleness counter can
                    // judge the lack of progress instead of spinning here.
                    break 'tasks;
                }
            }

            // ================================================================
            // Phase 2: spec gate
            // ================================================================
            let gate = self.run_gate(&self.config.spec_gate.clone(), "spec gate").await?;
            if !gate.success {
                self.ui.warn("spec gate failed; sending its output to do-task");
                let context = gate_context(&self.config.spec_gate, &gate.output);
                let _ = self.invoke(guard, AgentRole::DoTask, Some(&context)).await?;
                continue 'cycles;
            }

            // ================================================================
            // Phase 3: demo
            // ================================================================
            let outcome = self.invoke(guard, AgentRole::RunDemo, None).await?;
            match dispatch(AgentRole::RunDemo, &outcome.signal) {
                CycleAction::Proceed => {}
                CycleAction::RestartCycle => {
                    self.ui.warn("demo failed; restarting cycle");
                    continue 'cycles;
                }
                CycleAction::BreakTaskLoop => {}
                CycleAction::WarnAndProceed(msg) => self.ui.warn(msg),
                CycleAction::AbortBlocked => return Err(self.blocked(AgentRole::RunDemo)),
                CycleAction::AbortError => {
                    return Err(self.agent_error(AgentRole::RunDemo, &outcome))
                }
            }

            // ================================================================
            // Phase 4: spec audit
            // ================================================================
            let before = self.folder.audit_mtime();
            let _ = self.invoke(guard, AgentRole::AuditSpec, None).await?;
            let after = self.folder.audit_mtime();
            let advanced = match (before, after) {
                (_, None) => false,
                (None, Some(_)) => true,
                (Some(before), Some(after)) => after > before,
            };
            if !advanced {
                return Err(OrchestrateError::AuditStale {
                    audit: self.folder.audit_path(),
                });
            }

            let content = std::fs::read_to_string(self.folder.audit_path())?;
            match audit::parse_status(&content) {
                Some(AuditStatus::Pass) => {
                    info!(cycle, "spec audit passed");
                    return Ok(());
                }
                Some(AuditStatus::Fail) => {
                    self.ui.warn("spec audit failed; restarting cycle");
                    continue 'cycles;
                }
                None => {
                    return Err(OrchestrateError::UnknownAuditStatus {
                        status: audit::first_line(&content).to_string(),
                        audit: self.folder.audit_path(),
                    })
                }
            }
        }

        Err(OrchestrateError::CycleLimit {
            max_cycles: self.config.max_cycles,
        })
    }

    /// Invoke one agent role with the spinner, the spec guard, and the
    /// timeout-to-failure mapping applied.
    async fn invoke(
        &mut self,
        guard: &SpecGuard,
        role: AgentRole,
        extra_context: Option<&str>,
    ) -> OrchestrateResult<AgentOutcome> {
        self.check_interrupted()?;
        let cli = self.config.cli_for(role).to_string();
        let model = self.config.model_for(role).map(str::to_string);

        self.ui.begin_phase(role.command_name(), model.as_deref());
        let result = self
            .invoker
            .invoke(&self.folder, role, &cli, model.as_deref(), extra_context)
            .await;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                self.ui.end_phase(false, "could not run");
                return Err(e);
            }
        };

        if guard.enforce(&self.folder).await? {
            self.ui
                .warn("spec.md was mutated by the agent; reverted to the startup snapshot");
        }

        if outcome.timed_out {
            self.ui.end_phase(false, "timed out");
            return Err(OrchestrateError::AgentFailed {
                command: role.command_name().to_string(),
                detail: format!("timed out after {}s", self.config.agent_timeout),
            });
        }

        let ok = outcome.signal != AgentSignal::Error;
        match &outcome.signal {
            AgentSignal::Empty => self.ui.end_phase(ok, ""),
            signal => self.ui.end_phase(ok, &signal.to_string()),
        }
        self.check_interrupted()?;
        Ok(outcome)
    }

    /// Task gate with the bounded do-task retry loop.
    ///
    /// On each failure the gate's captured output is handed back to do-task
    /// as extra context, then the gate runs again. The output reported on
    /// abort is always the most recent run's.
    async fn run_task_gate(&mut self, guard: &SpecGuard) -> OrchestrateResult<()> {
        let command = self.config.task_gate.clone();
        let mut gate = self.run_gate(&command, "task gate").await?;
        let mut retries = 0;

        while !gate.success {
            if retries >= MAX_GATE_RETRIES {
                return Err(OrchestrateError::GateFailure {
                    gate: command,
                    attempts: retries + 1,
                    output: gate.output,
                });
            }
            retries += 1;
            self.ui.warn(&format!(
                "task gate failed; retrying do-task ({retries}/{MAX_GATE_RETRIES})"
            ));
            tokio::time::sleep(GATE_RETRY_GRACE).await;

            let context = gate_context(&command, &gate.output);
            let _ = self.invoke(guard, AgentRole::DoTask, Some(&context)).await?;
            gate = self.run_gate(&command, "task gate").await?;
        }
        Ok(())
    }

    /// Run one gate command through the shell with merged capture.
    ///
    /// Gates carry no timeout; they are expected to self-terminate.
    async fn run_gate(&mut self, command: &str, label: &str) -> OrchestrateResult<GateRun> {
        self.check_interrupted()?;
        self.ui.begin_phase(label, None);

        let outcome = self.runner.run(CommandSpec::shell(command), None).await?;
        match outcome {
            RunOutcome::Completed { exit_code, output } => {
                let output = String::from_utf8_lossy(&output).into_owned();
                let success = exit_code == 0;
                if success {
                    self.ui.end_phase(true, "");
                } else {
                    self.ui.end_phase(false, &format!("exit {exit_code}"));
                }
                info!(gate = command, exit_code, "gate finished");
                Ok(GateRun { success, output })
            }
            // Unreachable without a timeout, but a failed gate is a failed
            // gate either way.
            RunOutcome::TimedOut => {
                self.ui.end_phase(false, "timed out");
                Ok(GateRun {
                    success: false,
                    output: String::new(),
                })
            }
        }
    }

    /// After an audit pass, verify the checkbox transitioned and repair it
    /// when it did not. Returns whether the task loop may keep going.
    async fn heal_after_pass(&mut self, label: &str) -> OrchestrateResult<bool> {
        let plan = self.folder.read_plan()?;
        if plan.next_task_label().as_deref() != Some(label) {
            return Ok(true); // checkbox moved on its own
        }
        if !self.config.checkbox_heal {
            self.ui
                .warn("audited task's checkbox unchanged and healing is disabled");
            return Ok(false);
        }
        if self_heal::heal_checkboxes(&self.folder, label).await? {
            self.ui
                .warn("audited task's checkbox was unchanged; repaired plan.md");
            Ok(true)
        } else {
            warn!(task = label, "checkbox repair changed nothing");
            Ok(false)
        }
    }

    fn blocked(&self, role: AgentRole) -> OrchestrateError {
        OrchestrateError::AgentBlocked {
            command: role.command_name().to_string(),
            signposts: self.folder.signposts_path(),
        }
    }

    fn agent_error(&self, role: AgentRole, outcome: &AgentOutcome) -> OrchestrateError {
        let tail = output_tail(&outcome.output, OUTPUT_TAIL_CHARS);
        let detail = if tail.is_empty() {
            format!("signaled '{}'", outcome.signal)
        } else {
            format!("signaled '{}'; output tail:\n{tail}", outcome.signal)
        };
        OrchestrateError::AgentFailed {
            command: role.command_name().to_string(),
            detail,
        }
    }

    fn check_interrupted(&self) -> OrchestrateResult<()> {
        if cleanup::is_interrupted() {
            Err(OrchestrateError::Interrupted)
        } else {
            Ok(())
        }
    }
}

/// Render gate output as retry context for do-task, bounded in size.
fn gate_context(gate: &str, output: &str) -> String {
    format!(
        "The verification gate `{gate}` failed. Its output:\n{}",
        output_tail(output, GATE_CONTEXT_CHARS)
    )
}

/// The last `limit` characters of a buffer, on a char boundary.
fn output_tail(output: &str, limit: usize) -> &str {
    let trimmed = output.trim_end();
    if trimmed.chars().count() <= limit {
        return trimmed;
    }
    let skip = trimmed.chars().count() - limit;
    let byte_start = trimmed
        .char_indices()
        .nth(skip)
        .map_or(0, |(idx, _)| idx);
    &trimmed[byte_start..]
}

/// Best-effort completion chime; never blocks and never fails the run.
fn play_completion_sound() {
    #[cfg(target_os = "macos")]
    let (player, sound) = ("afplay", "/System/Library/Sounds/Glass.aiff");
    #[cfg(not(target_os = "macos"))]
    let (player, sound) = ("paplay", "/usr/share/sounds/freedesktop/stereo/complete.oga");

    let _ = std::process::Command::new(player)
        .arg(sound)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn();
}
