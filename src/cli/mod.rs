//! CLI interface module
//!
//! Argument surfaces for the two binaries plus terminal output formatting.

pub mod output;

use std::path::PathBuf;

use clap::Parser;

use crate::domain::models::AuditorConfig;

/// Drive the implement→verify→audit→demo loop over one spec folder.
#[derive(Debug, Parser)]
#[command(name = "orchestrate", version, about)]
pub struct OrchestrateArgs {
    /// Spec folder holding spec.md, plan.md, and friends.
    pub spec_folder: PathBuf,

    /// Shell-style KEY=value config file; overrides environment defaults.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log at info level instead of warn.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Audit every coding standard with one agent invocation each.
#[derive(Debug, Parser)]
#[command(name = "audit-standards", version, about)]
pub struct AuditStandardsArgs {
    /// Parallel agent invocations (default 3).
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// `--model` argument passed to the agent CLI.
    #[arg(long)]
    pub model: Option<String>,

    /// Per-agent timeout in seconds (default 900).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Directory reports are written to.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Comma-separated slug allow-list.
    #[arg(long)]
    pub standards: Option<String>,

    /// Directory holding the index and per-standard markdown.
    #[arg(long)]
    pub standards_dir: Option<PathBuf>,

    /// Report template file.
    #[arg(long)]
    pub template: Option<PathBuf>,

    /// Shell-style KEY=value config file; overrides environment defaults.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the run plan without invoking anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Log at info level instead of warn.
    #[arg(short, long)]
    pub verbose: bool,
}

impl AuditStandardsArgs {
    /// Fold command-line flags over a loaded configuration. Flags are the
    /// outermost layer and win over both environment and config file.
    pub fn apply(&self, mut config: AuditorConfig) -> AuditorConfig {
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(ref model) = self.model {
            config.model = Some(model.clone());
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(ref output) = self.output {
            config.output_dir.clone_from(output);
        }
        if let Some(ref standards) = self.standards {
            config.standards = Some(standards.clone());
        }
        if let Some(ref dir) = self.standards_dir {
            config.standards_dir.clone_from(dir);
        }
        if let Some(ref template) = self.template {
            config.template.clone_from(template);
        }
        if self.dry_run {
            config.dry_run = true;
        }
        config
    }
}
