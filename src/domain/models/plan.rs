//! Parsed view over a spec folder's `plan.md`.
//!
//! The only structure the orchestrator relies on is the task-line grammar:
//! `- [ ] Task <N> ...` for an actionable task, `- [x] Task <N> ...` for a
//! finished one, with indented `- [ ] Fix: ...` items hanging off a task.
//! Everything else in the file is opaque prose.

use regex::Regex;
use std::sync::OnceLock;

fn task_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\s*)- \[( |x)\] (Task \d+\b.*)$").expect("task line regex is valid")
    })
}

fn fix_item_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\s*)- \[( |x)\] Fix:").expect("fix item regex is valid"))
}

/// In-memory snapshot of `plan.md` content.
#[derive(Debug, Clone)]
pub struct TaskPlan {
    content: String,
}

impl TaskPlan {
    /// Wrap raw plan content.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    /// The underlying content, byte for byte.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Number of actionable (`[ ]`) task lines.
    pub fn actionable_count(&self) -> usize {
        self.task_lines().filter(|(_, checked, _)| !checked).count()
    }

    /// Label of the first actionable task line, e.g. `Task 2: Foo`.
    pub fn next_task_label(&self) -> Option<String> {
        self.task_lines()
            .find(|(_, checked, _)| !checked)
            .map(|(_, _, label)| label)
    }

    /// Flip the first `- [ ] <label>` line to `- [x] <label>`, along with the
    /// run of more-indented `Fix:` items immediately below it.
    ///
    /// Returns the rewritten content, or `None` when nothing changed (the
    /// checkbox was already ticked or the label is gone), which makes the
    /// repair idempotent.
    pub fn check_off(&self, label: &str) -> Option<String> {
        let mut lines: Vec<String> = self.content.lines().map(str::to_string).collect();
        let mut changed = false;
        let mut idx = None;
        let mut task_indent = 0;

        for (i, line) in lines.iter().enumerate() {
            if let Some(caps) = task_line_regex().captures(line) {
                if caps[3].trim_end() == label {
                    if &caps[2] == " " {
                        idx = Some(i);
                        task_indent = caps[1].len();
                    }
                    break;
                }
            }
        }

        if let Some(i) = idx {
            lines[i] = flip_checkbox(&lines[i]);
            changed = true;

            // The run of fix items belonging to this task: consecutive
            // more-indented `- [ ] Fix:` lines directly below it.
            for line in lines.iter_mut().skip(i + 1) {
                let Some(caps) = fix_item_regex().captures(line) else {
                    break;
                };
                if caps[1].len() <= task_indent {
                    break;
                }
                if &caps[2] == " " {
                    *line = flip_checkbox(line);
                }
            }
        }

        if changed {
            let mut out = lines.join("\n");
            if self.content.ends_with('\n') {
                out.push('\n');
            }
            Some(out)
        } else {
            None
        }
    }

    fn task_lines(&self) -> impl Iterator<Item = (usize, bool, String)> + '_ {
        self.content.lines().enumerate().filter_map(|(i, line)| {
            task_line_regex()
                .captures(line)
                .map(|caps| (i, &caps[2] == "x", caps[3].trim_end().to_string()))
        })
    }
}

fn flip_checkbox(line: &str) -> String {
    line.replacen("- [ ]", "- [x]", 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN: &str = "\
# Plan

- [x] Task 1: Scaffold
- [ ] Task 2: Foo
  - [ ] Fix: handle empty input
  - [x] Fix: typo in docs
- [ ] Task 3: Bar

Notes follow.
";

    #[test]
    fn counts_actionable_tasks() {
        let plan = TaskPlan::new(PLAN);
        assert_eq!(plan.actionable_count(), 2);
    }

    #[test]
    fn fix_items_are_not_schedulable() {
        let plan = TaskPlan::new(PLAN);
        // Two actionable tasks, not three: the unchecked Fix item is owned
        // by Task 2 and never scheduled on its own.
        assert_eq!(plan.next_task_label().as_deref(), Some("Task 2: Foo"));
    }

    #[test]
    fn check_off_flips_task_and_its_fix_run() {
        let plan = TaskPlan::new(PLAN);
        let healed = plan.check_off("Task 2: Foo").expect("plan changed");
        assert!(healed.contains("- [x] Task 2: Foo"));
        assert!(healed.contains("  - [x] Fix: handle empty input"));
        // The next task is untouched.
        assert!(healed.contains("- [ ] Task 3: Bar"));
    }

    #[test]
    fn check_off_stops_at_the_next_task() {
        let plan = TaskPlan::new(
            "- [ ] Task 1: A\n  - [ ] Fix: one\n- [ ] Task 2: B\n  - [ ] Fix: two\n",
        );
        let healed = plan.check_off("Task 1: A").expect("plan changed");
        assert!(healed.contains("- [x] Task 1: A"));
        assert!(healed.contains("  - [x] Fix: one"));
        assert!(healed.contains("- [ ] Task 2: B"));
        assert!(healed.contains("  - [ ] Fix: two"));
    }

    #[test]
    fn check_off_is_idempotent() {
        let plan = TaskPlan::new(PLAN);
        let healed = plan.check_off("Task 2: Foo").expect("plan changed");
        let again = TaskPlan::new(healed);
        assert!(again.check_off("Task 2: Foo").is_none());
    }

    #[test]
    fn check_off_unknown_label_is_a_no_op() {
        let plan = TaskPlan::new(PLAN);
        assert!(plan.check_off("Task 9: Nope").is_none());
    }

    #[test]
    fn preserves_trailing_newline() {
        let plan = TaskPlan::new("- [ ] Task 1: A\n");
        let healed = plan.check_off("Task 1: A").expect("plan changed");
        assert_eq!(healed, "- [x] Task 1: A\n");
    }

    #[test]
    fn non_task_checkboxes_are_ignored() {
        let plan = TaskPlan::new("- [ ] groceries\n- [ ] Task 1: real\n");
        assert_eq!(plan.actionable_count(), 1);
        assert_eq!(plan.next_task_label().as_deref(), Some("Task 1: real"));
    }

    #[test]
    fn empty_plan_has_no_tasks() {
        let plan = TaskPlan::new("");
        assert_eq!(plan.actionable_count(), 0);
        assert!(plan.next_task_label().is_none());
    }
}
