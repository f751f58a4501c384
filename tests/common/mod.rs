//! Common test utilities for integration tests
//!
//! Builds throwaway spec folders, command prompt files, and fake agent
//! scripts so scenarios drive the real orchestrator without any LLM CLI.

// Each integration binary uses its own slice of these helpers.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use agentos::domain::models::OrchestratorConfig;
use agentos::infrastructure::workspace::SpecFolder;

/// A spec folder plus the scaffolding the orchestrator needs around it.
pub struct SpecFixture {
    /// Owns every path below; dropped last.
    pub root: TempDir,
    pub spec_dir: PathBuf,
    pub commands_dir: PathBuf,
}

impl SpecFixture {
    /// Create a fixture with the given `plan.md` content and the four
    /// command prompt files.
    pub fn new(plan: &str) -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        let spec_dir = root.path().join("spec");
        std::fs::create_dir(&spec_dir).expect("create spec dir");
        std::fs::write(spec_dir.join("spec.md"), "# Feature spec\n\nImmutable.\n")
            .expect("write spec.md");
        std::fs::write(spec_dir.join("plan.md"), plan).expect("write plan.md");

        let commands_dir = root.path().join("commands");
        std::fs::create_dir(&commands_dir).expect("create commands dir");
        for command in ["do-task", "audit-task", "run-demo", "audit-spec"] {
            std::fs::write(
                commands_dir.join(format!("{command}.md")),
                format!("You are the {command} agent.\n"),
            )
            .expect("write command file");
        }

        Self {
            root,
            spec_dir,
            commands_dir,
        }
    }

    pub fn folder(&self) -> SpecFolder {
        SpecFolder::new(&self.spec_dir)
    }

    /// Base configuration: fast budgets, always-green gates, and every role
    /// pointing at `true` until a test installs its fakes.
    pub fn config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            cli: "true".to_string(),
            audit_cli: "true".to_string(),
            task_gate: "true".to_string(),
            spec_gate: "true".to_string(),
            commands_dir: self.commands_dir.clone(),
            agent_timeout: 30,
            max_cycles: 6,
            ..OrchestratorConfig::default()
        }
    }

    /// Write an executable shell script and return its path as a CLI
    /// command string.
    pub fn write_agent(&self, name: &str, body: &str) -> String {
        write_script(self.root.path(), name, body)
    }

    pub fn plan_path(&self) -> PathBuf {
        self.spec_dir.join("plan.md")
    }

    pub fn status_path(&self) -> PathBuf {
        self.spec_dir.join(".agent-status")
    }

    /// A scratch file path for scripts that count their invocations.
    pub fn counter_path(&self, name: &str) -> PathBuf {
        self.root.path().join(name)
    }

    /// Lines a counting script has appended so far.
    pub fn count_lines(&self, name: &str) -> usize {
        std::fs::read_to_string(self.counter_path(name))
            .map(|content| content.lines().count())
            .unwrap_or(0)
    }
}

/// Write `#!/bin/sh` + body into an executable file.
pub fn write_script(dir: &Path, name: &str, body: &str) -> String {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    let mut perms = std::fs::metadata(&path).expect("script metadata").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod script");
    path.display().to_string()
}

/// A shell snippet that appends one line to a counter file.
pub fn count_invocation(counter: &Path) -> String {
    format!("echo run >> \"{}\"", counter.display())
}

/// A shell snippet that writes `<command>-status: <signal>` to the status
/// file the way a well-behaved agent does.
pub fn write_status(status: &Path, command: &str, signal: &str) -> String {
    format!(
        "printf '{command}-status: {signal}\\n' > \"{}\"",
        status.display()
    )
}

/// A shell snippet that flips a plan checkbox with portable sed.
pub fn flip_checkbox(plan: &Path, label: &str) -> String {
    let escaped = label.replace('/', r"\/");
    format!(
        "sed 's/- \\[ \\] {escaped}/- [x] {escaped}/' \"{plan}\" > \"{plan}.tmp\" && mv \"{plan}.tmp\" \"{plan}\"",
        plan = plan.display()
    )
}
