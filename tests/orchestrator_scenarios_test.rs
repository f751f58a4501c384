//! End-to-end orchestrator scenarios with fake agent CLIs.
//!
//! Every scenario drives `Orchestrator::run` against a temp spec folder
//! whose agents are small shell scripts, so no real LLM CLI or git remote
//! is involved.

mod common;

use agentos::domain::errors::OrchestrateError;
use agentos::infrastructure::workspace::RunLock;
use agentos::services::Orchestrator;

use common::{count_invocation, flip_checkbox, write_status, SpecFixture};

/// Scenario A: one actionable task, everything green, done in one cycle.
#[tokio::test]
async fn happy_path_exits_cleanly_in_one_cycle() {
    let fx = SpecFixture::new("- [ ] Task 2: Foo\n");
    let do_counter = fx.counter_path("do.count");

    let do_cli = fx.write_agent(
        "do.sh",
        &format!(
            "{}\n{}\n{}",
            count_invocation(&do_counter),
            flip_checkbox(&fx.plan_path(), "Task 2: Foo"),
            write_status(&fx.status_path(), "do-task", "complete"),
        ),
    );
    let audit_cli = fx.write_agent(
        "audit.sh",
        &write_status(&fx.status_path(), "audit-task", "pass"),
    );
    let demo_cli = fx.write_agent(
        "demo.sh",
        &write_status(&fx.status_path(), "run-demo", "pass"),
    );
    let spec_cli = fx.write_agent(
        "spec.sh",
        &format!(
            "printf 'status: pass\\n\\nLooks correct.\\n' > \"{}\"",
            fx.spec_dir.join("audit.md").display()
        ),
    );

    let mut config = fx.config();
    config.do_cli = Some(do_cli);
    config.audit_cli = audit_cli;
    config.demo_cli = Some(demo_cli);
    config.spec_cli = Some(spec_cli);

    let mut orchestrator = Orchestrator::new(fx.folder(), config);
    orchestrator.run().await.expect("run succeeds");

    assert_eq!(fx.count_lines("do.count"), 1, "exactly one cycle of work");
    let plan = std::fs::read_to_string(fx.plan_path()).unwrap();
    assert!(plan.contains("- [x] Task 2: Foo"));
    // Transients are gone on the success path.
    assert!(!fx.status_path().exists());
    assert!(!fx.spec_dir.join(".orchestrate.spec.bak").exists());
}

/// Scenario B: the audit keeps failing on the same un-ticked task until the
/// retry budget trips.
#[tokio::test]
async fn stuck_task_aborts_after_retry_budget() {
    let fx = SpecFixture::new("- [ ] Task 2: Foo\n");
    let do_counter = fx.counter_path("do.count");

    let do_cli = fx.write_agent(
        "do.sh",
        &format!(
            "{}\n{}",
            count_invocation(&do_counter),
            write_status(&fx.status_path(), "do-task", "complete"),
        ),
    );
    let audit_cli = fx.write_agent(
        "audit.sh",
        &write_status(&fx.status_path(), "audit-task", "fail"),
    );

    let mut config = fx.config();
    config.do_cli = Some(do_cli);
    config.audit_cli = audit_cli;
    config.max_task_retries = 3;

    let mut orchestrator = Orchestrator::new(fx.folder(), config);
    let err = orchestrator.run().await.unwrap_err();
    match err {
        OrchestrateError::TaskStuck { label, attempts } => {
            assert_eq!(label, "Task 2: Foo");
            assert_eq!(attempts, 4);
        }
        other => panic!("expected TaskStuck, got {other}"),
    }
    assert_eq!(fx.count_lines("do.count"), 3);
}

/// Scenario C: the task gate fails twice, do-task is re-invoked with the
/// gate output, and the third gate run goes green.
#[tokio::test]
async fn gate_retry_then_success() {
    let fx = SpecFixture::new("- [ ] Task 1: Wire it up\n");
    let do_counter = fx.counter_path("do.count");
    let gate_counter = fx.counter_path("gate.count");

    let do_cli = fx.write_agent(
        "do.sh",
        &format!(
            "{}\n{}\n{}",
            count_invocation(&do_counter),
            flip_checkbox(&fx.plan_path(), "Task 1: Wire it up"),
            write_status(&fx.status_path(), "do-task", "complete"),
        ),
    );
    // Fails on runs 1 and 2, succeeds from run 3 on.
    let task_gate = fx.write_agent(
        "gate.sh",
        &format!(
            "n=$(cat \"{counter}\" 2>/dev/null | wc -l)\n\
             n=$((n+1))\n\
             echo run >> \"{counter}\"\n\
             echo \"gate attempt $n\"\n\
             [ \"$n\" -ge 3 ]",
            counter = gate_counter.display()
        ),
    );
    let audit_cli = fx.write_agent(
        "audit.sh",
        &write_status(&fx.status_path(), "audit-task", "pass"),
    );
    let demo_cli = fx.write_agent(
        "demo.sh",
        &write_status(&fx.status_path(), "run-demo", "pass"),
    );
    let spec_cli = fx.write_agent(
        "spec.sh",
        &format!(
            "printf 'status: pass\\n' > \"{}\"",
            fx.spec_dir.join("audit.md").display()
        ),
    );

    let mut config = fx.config();
    config.do_cli = Some(do_cli);
    config.audit_cli = audit_cli;
    config.demo_cli = Some(demo_cli);
    config.spec_cli = Some(spec_cli);
    config.task_gate = task_gate;

    let mut orchestrator = Orchestrator::new(fx.folder(), config);
    orchestrator.run().await.expect("run succeeds");

    assert_eq!(fx.count_lines("do.count"), 3, "initial + two gate retries");
    assert_eq!(fx.count_lines("gate.count"), 3);
}

/// Scenario C variant: a gate that never passes aborts with its most recent
/// output after the budget.
#[tokio::test]
async fn gate_exhaustion_aborts_with_latest_output() {
    let fx = SpecFixture::new("- [ ] Task 1: A\n");
    let gate_counter = fx.counter_path("gate.count");

    let do_cli = fx.write_agent(
        "do.sh",
        &write_status(&fx.status_path(), "do-task", "complete"),
    );
    let task_gate = fx.write_agent(
        "gate.sh",
        &format!(
            "echo run >> \"{counter}\"\n\
             echo \"failure $(cat \"{counter}\" | wc -l)\"\n\
             exit 1",
            counter = gate_counter.display()
        ),
    );

    let mut config = fx.config();
    config.do_cli = Some(do_cli);
    config.task_gate = task_gate;

    let mut orchestrator = Orchestrator::new(fx.folder(), config);
    let err = orchestrator.run().await.unwrap_err();
    match err {
        OrchestrateError::GateFailure { attempts, output, .. } => {
            assert_eq!(attempts, 4, "initial run plus three retries");
            // The reported output comes from the latest gate run.
            assert!(output.contains("failure 4"), "got: {output}");
        }
        other => panic!("expected GateFailure, got {other}"),
    }
}

/// Scenario D: an agent edits spec.md; the orchestrator restores it and
/// keeps going.
#[tokio::test]
async fn spec_mutation_is_reverted() {
    let fx = SpecFixture::new("- [ ] Task 1: A\n");
    let original_spec = std::fs::read_to_string(fx.spec_dir.join("spec.md")).unwrap();

    let do_cli = fx.write_agent(
        "do.sh",
        &format!(
            "echo 'sneaky scope creep' >> \"{spec}\"\n{flip}\n{status}",
            spec = fx.spec_dir.join("spec.md").display(),
            flip = flip_checkbox(&fx.plan_path(), "Task 1: A"),
            status = write_status(&fx.status_path(), "do-task", "complete"),
        ),
    );
    let audit_cli = fx.write_agent(
        "audit.sh",
        &write_status(&fx.status_path(), "audit-task", "pass"),
    );
    let demo_cli = fx.write_agent(
        "demo.sh",
        &write_status(&fx.status_path(), "run-demo", "pass"),
    );
    let spec_cli = fx.write_agent(
        "spec.sh",
        &format!(
            "printf 'status: pass\\n' > \"{}\"",
            fx.spec_dir.join("audit.md").display()
        ),
    );

    let mut config = fx.config();
    config.do_cli = Some(do_cli);
    config.audit_cli = audit_cli;
    config.demo_cli = Some(demo_cli);
    config.spec_cli = Some(spec_cli);

    let mut orchestrator = Orchestrator::new(fx.folder(), config);
    orchestrator.run().await.expect("run succeeds despite mutation");

    assert_eq!(
        std::fs::read_to_string(fx.spec_dir.join("spec.md")).unwrap(),
        original_spec,
        "spec.md equals the startup snapshot"
    );
}

/// Scenario E: nothing ever changes the plan; the staleness counter stops
/// the audit/implement ping-pong.
#[tokio::test]
async fn stale_plan_aborts_after_stale_limit() {
    let fx = SpecFixture::new("- [ ] Task 1: A\n");

    let do_cli = fx.write_agent(
        "do.sh",
        &write_status(&fx.status_path(), "do-task", "complete"),
    );
    let audit_cli = fx.write_agent(
        "audit.sh",
        &write_status(&fx.status_path(), "audit-task", "pass"),
    );
    // The demo keeps failing, so each cycle restarts from the top.
    let demo_cli = fx.write_agent(
        "demo.sh",
        &write_status(&fx.status_path(), "run-demo", "fail"),
    );

    let mut config = fx.config();
    config.do_cli = Some(do_cli);
    config.audit_cli = audit_cli;
    config.demo_cli = Some(demo_cli);
    config.checkbox_heal = false;
    config.stale_limit = 3;
    config.max_cycles = 10;

    let mut orchestrator = Orchestrator::new(fx.folder(), config);
    let err = orchestrator.run().await.unwrap_err();
    match err {
        OrchestrateError::Stale { cycles, .. } => assert_eq!(cycles, 3),
        other => panic!("expected Stale, got {other}"),
    }
}

/// Scenario F: the second orchestrator on the same folder is refused before
/// it touches anything.
#[tokio::test]
async fn concurrent_orchestrators_are_locked_out() {
    let fx = SpecFixture::new("- [ ] Task 1: A\n");
    let folder = fx.folder();

    let _held = RunLock::acquire(&folder).expect("first lock");
    let err = RunLock::acquire(&folder).unwrap_err();
    assert!(matches!(err, OrchestrateError::LockContention { .. }));

    let plan = std::fs::read_to_string(fx.plan_path()).unwrap();
    assert_eq!(plan, "- [ ] Task 1: A\n", "folder contents unchanged");
}

/// A blocked agent surfaces the signposts pointer and stops the run.
#[tokio::test]
async fn blocked_agent_aborts_with_signposts_pointer() {
    let fx = SpecFixture::new("- [ ] Task 1: A\n");

    let do_cli = fx.write_agent(
        "do.sh",
        &write_status(&fx.status_path(), "do-task", "blocked"),
    );
    let mut config = fx.config();
    config.do_cli = Some(do_cli);

    let mut orchestrator = Orchestrator::new(fx.folder(), config);
    let err = orchestrator.run().await.unwrap_err();
    match err {
        OrchestrateError::AgentBlocked { command, signposts } => {
            assert_eq!(command, "do-task");
            assert!(signposts.ends_with("signposts.md"));
        }
        other => panic!("expected AgentBlocked, got {other}"),
    }
}

/// An agent that wedges past the timeout is treated as an agent failure.
#[tokio::test]
async fn timed_out_agent_aborts_the_run() {
    let fx = SpecFixture::new("- [ ] Task 1: A\n");

    let do_cli = fx.write_agent("do.sh", "sleep 30");
    let mut config = fx.config();
    config.do_cli = Some(do_cli);
    config.agent_timeout = 1;

    let mut orchestrator = Orchestrator::new(fx.folder(), config);
    let err = orchestrator.run().await.unwrap_err();
    match err {
        OrchestrateError::AgentFailed { command, detail } => {
            assert_eq!(command, "do-task");
            assert!(detail.contains("timed out"));
        }
        other => panic!("expected AgentFailed, got {other}"),
    }
}

/// audit-spec must actually rewrite audit.md; a stale file aborts.
#[tokio::test]
async fn unwritten_audit_report_aborts() {
    let fx = SpecFixture::new("- [x] Task 1: A\n");

    let demo_cli = fx.write_agent(
        "demo.sh",
        &write_status(&fx.status_path(), "run-demo", "pass"),
    );
    // audit-spec exits happily without touching audit.md.
    let spec_cli = fx.write_agent("spec.sh", "exit 0");

    let mut config = fx.config();
    config.demo_cli = Some(demo_cli);
    config.spec_cli = Some(spec_cli);

    let mut orchestrator = Orchestrator::new(fx.folder(), config);
    let err = orchestrator.run().await.unwrap_err();
    assert!(matches!(err, OrchestrateError::AuditStale { .. }));
}

/// A report whose header is neither pass nor fail aborts instead of
/// guessing.
#[tokio::test]
async fn unknown_audit_status_aborts() {
    let fx = SpecFixture::new("- [x] Task 1: A\n");

    let demo_cli = fx.write_agent(
        "demo.sh",
        &write_status(&fx.status_path(), "run-demo", "pass"),
    );
    let spec_cli = fx.write_agent(
        "spec.sh",
        &format!(
            "printf 'status: perhaps\\n' > \"{}\"",
            fx.spec_dir.join("audit.md").display()
        ),
    );

    let mut config = fx.config();
    config.demo_cli = Some(demo_cli);
    config.spec_cli = Some(spec_cli);

    let mut orchestrator = Orchestrator::new(fx.folder(), config);
    let err = orchestrator.run().await.unwrap_err();
    match err {
        OrchestrateError::UnknownAuditStatus { status, .. } => {
            assert_eq!(status, "status: perhaps");
        }
        other => panic!("expected UnknownAuditStatus, got {other}"),
    }
}

/// A failing spec audit restarts the cycle; the cap stops an endless loop.
#[tokio::test]
async fn failing_spec_audit_cycles_until_the_cap() {
    let fx = SpecFixture::new("- [x] Task 1: A\n");
    let spec_counter = fx.counter_path("spec.count");

    let demo_cli = fx.write_agent(
        "demo.sh",
        &write_status(&fx.status_path(), "run-demo", "pass"),
    );
    let spec_cli = fx.write_agent(
        "spec.sh",
        &format!(
            "{}\nprintf 'status: fail\\n' > \"{}\"",
            count_invocation(&spec_counter),
            fx.spec_dir.join("audit.md").display()
        ),
    );

    let mut config = fx.config();
    config.demo_cli = Some(demo_cli);
    config.spec_cli = Some(spec_cli);
    config.max_cycles = 2;

    let mut orchestrator = Orchestrator::new(fx.folder(), config);
    let err = orchestrator.run().await.unwrap_err();
    assert!(matches!(err, OrchestrateError::CycleLimit { max_cycles: 2 }));
    assert_eq!(fx.count_lines("spec.count"), 2);
}
