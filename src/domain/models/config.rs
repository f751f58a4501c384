//! Configuration models for the orchestrator and the standards auditor.
//!
//! Both structs are plain serde values so figment can layer struct
//! defaults, environment variables, and the shell-style config file.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::signal::AgentRole;

/// Configuration for one orchestrator run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Base agent CLI command string for the implementation-side roles.
    pub cli: String,
    /// Per-role CLI overrides.
    pub do_cli: Option<String>,
    pub audit_cli: String,
    pub demo_cli: Option<String>,
    pub spec_cli: Option<String>,
    /// Per-role `--model` arguments.
    pub do_model: Option<String>,
    pub audit_model: Option<String>,
    pub demo_model: Option<String>,
    pub spec_model: Option<String>,
    /// Shell command run after each task.
    pub task_gate: String,
    /// Shell command run before the demo.
    pub spec_gate: String,
    /// Safety cap on cycles.
    pub max_cycles: u32,
    /// Directory containing `<command>.md` prompt files.
    pub commands_dir: PathBuf,
    /// Per-agent wall-clock timeout in seconds.
    pub agent_timeout: u64,
    /// Consecutive same-task retries before abort.
    pub max_task_retries: u32,
    /// Consecutive unchanged-plan cycles before abort.
    pub stale_limit: u32,
    /// Whether to fall back to grepping captured output for a status signal
    /// when the status file is empty.
    pub signal_fallback: bool,
    /// Whether to repair an un-ticked checkbox after an audit pass.
    pub checkbox_heal: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cli: "claude -p".to_string(),
            do_cli: None,
            audit_cli: "codex exec".to_string(),
            demo_cli: None,
            spec_cli: None,
            do_model: None,
            audit_model: None,
            demo_model: None,
            spec_model: None,
            task_gate: "make check".to_string(),
            spec_gate: "make all".to_string(),
            max_cycles: 10,
            commands_dir: PathBuf::from("commands"),
            agent_timeout: 1800,
            max_task_retries: 5,
            stale_limit: 3,
            signal_fallback: true,
            checkbox_heal: true,
        }
    }
}

impl OrchestratorConfig {
    /// CLI command string for a role.
    ///
    /// Implementation-side roles default to `cli`; the audit-side roles
    /// default to `audit_cli`, which intentionally differs.
    pub fn cli_for(&self, role: AgentRole) -> &str {
        match role {
            AgentRole::DoTask => self.do_cli.as_deref().unwrap_or(&self.cli),
            AgentRole::RunDemo => self.demo_cli.as_deref().unwrap_or(&self.cli),
            AgentRole::AuditTask => &self.audit_cli,
            AgentRole::AuditSpec => self.spec_cli.as_deref().unwrap_or(&self.audit_cli),
        }
    }

    /// `--model` argument for a role, when configured.
    pub fn model_for(&self, role: AgentRole) -> Option<&str> {
        match role {
            AgentRole::DoTask => self.do_model.as_deref(),
            AgentRole::AuditTask => self.audit_model.as_deref(),
            AgentRole::RunDemo => self.demo_model.as_deref(),
            AgentRole::AuditSpec => self.spec_model.as_deref(),
        }
    }

    /// Agent timeout as a duration.
    pub fn agent_timeout(&self) -> Duration {
        Duration::from_secs(self.agent_timeout)
    }
}

/// Configuration for one standards-auditor run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditorConfig {
    /// Agent CLI command string.
    pub cli: String,
    /// Optional `--model` argument.
    pub model: Option<String>,
    /// Parallel worker bound.
    pub concurrency: usize,
    /// Per-agent wall-clock timeout in seconds.
    pub timeout: u64,
    /// Directory holding the index and per-standard markdown.
    pub standards_dir: PathBuf,
    /// Name of the index file inside the standards directory.
    pub index_file: String,
    /// Report template path.
    pub template: PathBuf,
    /// Where reports are written.
    pub output_dir: PathBuf,
    /// Optional comma-separated slug allow-list.
    pub standards: Option<String>,
    /// Print the run plan and exit without invoking anything.
    pub dry_run: bool,
}

impl Default for AuditorConfig {
    fn default() -> Self {
        Self {
            cli: "claude -p".to_string(),
            model: None,
            concurrency: 3,
            timeout: 900,
            standards_dir: PathBuf::from("standards"),
            index_file: "index.yaml".to_string(),
            template: PathBuf::from("standards/report-template.md"),
            output_dir: PathBuf::from("standards-reports"),
            standards: None,
            dry_run: false,
        }
    }
}

impl AuditorConfig {
    /// Agent timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Full path of the standards index file.
    pub fn index_path(&self) -> PathBuf {
        self.standards_dir.join(&self.index_file)
    }
}
