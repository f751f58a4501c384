//! Agent invocation: prompt assembly, CLI flavor, signal extraction.
//!
//! The agent CLI is an opaque binary with one contract: read the prompt
//! from stdin, write `<command>-status: <signal>` to the status file before
//! exiting, and finish within the timeout. Two flavors exist in the wild:
//! codex-style CLIs take `-o <file>` and write their final message there;
//! claude-style CLIs write to stdout. The command string is inspected to
//! pick the flavor.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::errors::{OrchestrateError, OrchestrateResult};
use crate::domain::models::signal::{AgentRole, AgentSignal};
use crate::domain::models::OrchestratorConfig;
use crate::infrastructure::process::{cleanup, CommandSpec, ProcessRunner, RunOutcome};
use crate::infrastructure::workspace::SpecFolder;

/// Result of one agent invocation.
#[derive(Debug)]
pub struct AgentOutcome {
    /// Extracted exit signal; [`AgentSignal::Empty`] when none was found.
    pub signal: AgentSignal,
    /// The agent's captured output, lossily decoded.
    pub output: String,
    /// Whether the runner killed the agent at the timeout.
    pub timed_out: bool,
}

/// Invokes agent CLIs against a spec folder.
pub struct AgentInvoker {
    runner: ProcessRunner,
    commands_dir: PathBuf,
    timeout: Duration,
    signal_fallback: bool,
}

impl AgentInvoker {
    /// Build an invoker from the run configuration.
    pub fn new(config: &OrchestratorConfig) -> Self {
        Self {
            runner: ProcessRunner,
            commands_dir: config.commands_dir.clone(),
            timeout: config.agent_timeout(),
            signal_fallback: config.signal_fallback,
        }
    }

    /// Invoke one agent role and extract its exit signal.
    ///
    /// `extra_context` carries gate output back into a retry prompt.
    pub async fn invoke(
        &self,
        folder: &SpecFolder,
        role: AgentRole,
        cli: &str,
        model: Option<&str>,
        extra_context: Option<&str>,
    ) -> OrchestrateResult<AgentOutcome> {
        let command = role.command_name();
        folder.clear_status()?;

        let command_path = self.commands_dir.join(format!("{command}.md"));
        let command_md = std::fs::read_to_string(&command_path).map_err(|_| {
            OrchestrateError::Config(format!(
                "command file missing: {}",
                command_path.display()
            ))
        })?;

        let prompt = build_prompt(&command_md, folder, command, extra_context);

        let mut argv: Vec<String> = cli.split_whitespace().map(str::to_string).collect();
        if argv.is_empty() {
            return Err(OrchestrateError::Config(format!(
                "empty CLI command for {command}"
            )));
        }

        // Codex-style CLIs deliver the final message through a file.
        let capture_file = if cli.contains("codex") {
            let path = folder.root().join(format!(".orchestrate.{command}.out"));
            let _ = std::fs::remove_file(&path);
            cleanup::register_transient(&path);
            argv.push("-o".to_string());
            argv.push(path.display().to_string());
            Some(path)
        } else {
            None
        };

        if let Some(model) = model {
            argv.push("--model".to_string());
            argv.push(model.to_string());
        }

        debug!(command, cli, model = model.unwrap_or("-"), "invoking agent");

        let spec = CommandSpec {
            argv,
            cwd: None,
            stdin: Some(prompt.into_bytes()),
            capture_file: capture_file.clone(),
        };
        let outcome = self.runner.run(spec, Some(self.timeout)).await?;

        if let Some(path) = capture_file {
            let _ = std::fs::remove_file(&path);
            cleanup::unregister_transient(&path);
        }

        match outcome {
            RunOutcome::TimedOut => Ok(AgentOutcome {
                signal: AgentSignal::Empty,
                output: String::new(),
                timed_out: true,
            }),
            RunOutcome::Completed { exit_code, output } => {
                let output = String::from_utf8_lossy(&output).into_owned();
                if exit_code != 0 {
                    warn!(command, exit_code, "agent CLI exited non-zero");
                }
                let signal = self.extract_signal(folder, command, &output);
                debug!(command, %signal, "agent finished");
                Ok(AgentOutcome {
                    signal,
                    output,
                    timed_out: false,
                })
            }
        }
    }

    /// Status file first; captured output only as the configured fallback.
    fn extract_signal(&self, folder: &SpecFolder, command: &str, output: &str) -> AgentSignal {
        if let Some(status) = folder.read_status() {
            if let Some(signal) = AgentSignal::extract(command, &status) {
                return signal;
            }
        }
        if self.signal_fallback {
            if let Some(signal) = AgentSignal::extract(command, output) {
                return signal;
            }
        }
        AgentSignal::Empty
    }
}

fn build_prompt(
    command_md: &str,
    folder: &SpecFolder,
    command: &str,
    extra_context: Option<&str>,
) -> String {
    let mut prompt = String::with_capacity(command_md.len() + 512);
    prompt.push_str(command_md);
    prompt.push_str("\n\n---\n\n");
    prompt.push_str(&format!("Spec folder: {}\n", folder.root().display()));
    if let Some(context) = extra_context {
        prompt.push_str("\nAdditional context:\n");
        prompt.push_str(context);
        prompt.push('\n');
    }
    prompt.push_str(&format!(
        "\nBefore exiting, write a single line `{command}-status: <signal>` to {} using your file-writing tool.\n",
        folder.status_path().display()
    ));
    prompt
}
