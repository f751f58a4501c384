//! Parallel standards auditor.
//!
//! One agent invocation per standard from the two-level YAML index, fanned
//! out under a semaphore. Workers share nothing but an append-only result
//! list behind a lock; a single interrupt tears down every in-flight
//! process group through the shared registry.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use comfy_table::{presets, Cell, CellAlignment, ContentArrangement, Table};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::domain::errors::{OrchestrateError, OrchestrateResult};
use crate::domain::models::standards::{filter_standards, parse_index, Standard};
use crate::domain::models::AuditorConfig;
use crate::infrastructure::process::{cleanup, CommandSpec, ProcessRunner, RunOutcome};

/// Classification of one standard's audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StandardOutcome {
    /// The agent wrote a non-empty report.
    Pass,
    /// No usable report; carries the agent's exit code.
    Fail(i32),
    /// The agent was killed at the timeout.
    Timeout,
    /// The standard's markdown file is missing.
    Skip,
}

impl std::fmt::Display for StandardOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => f.write_str("PASS"),
            Self::Fail(code) => write!(f, "FAIL ({code})"),
            Self::Timeout => f.write_str("TIMEOUT"),
            Self::Skip => f.write_str("SKIP"),
        }
    }
}

/// One standard's result row.
#[derive(Debug, Clone)]
pub struct StandardResult {
    pub standard: Standard,
    pub outcome: StandardOutcome,
    pub elapsed: Duration,
}

/// Aggregate of a full auditor run.
#[derive(Debug)]
pub struct AuditSummary {
    pub results: Vec<StandardResult>,
    pub elapsed: Duration,
}

impl AuditSummary {
    /// Whether every selected standard produced a report.
    pub fn all_passed(&self) -> bool {
        self.results
            .iter()
            .all(|r| matches!(r.outcome, StandardOutcome::Pass | StandardOutcome::Skip))
    }

    fn count(&self, matches: impl Fn(&StandardOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| matches(&r.outcome)).count()
    }

    /// Render the sorted result table plus totals.
    pub fn render(&self) -> String {
        let mut rows = self.results.clone();
        rows.sort_by(|a, b| a.standard.slug.cmp(&b.standard.slug));

        let mut table = Table::new();
        table
            .load_preset(presets::NOTHING)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(
                ["STANDARD", "CATEGORY", "RESULT", "TIME"]
                    .iter()
                    .map(|h| Cell::new(h).set_alignment(CellAlignment::Left)),
            );
        for row in &rows {
            table.add_row(vec![
                Cell::new(&row.standard.slug),
                Cell::new(&row.standard.category),
                Cell::new(row.outcome.to_string()),
                Cell::new(format!("{:.1}s", row.elapsed.as_secs_f64())),
            ]);
        }

        let totals = format!(
            "{} standards: {} pass, {} fail, {} timeout, {} skipped in {:.1}s",
            self.results.len(),
            self.count(|o| matches!(o, StandardOutcome::Pass)),
            self.count(|o| matches!(o, StandardOutcome::Fail(_))),
            self.count(|o| matches!(o, StandardOutcome::Timeout)),
            self.count(|o| matches!(o, StandardOutcome::Skip)),
            self.elapsed.as_secs_f64(),
        );
        let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        format!("{table}\n\n{totals}\ngenerated at {stamp}")
    }
}

/// Fans agent invocations out over the standards index.
pub struct StandardsAuditor {
    config: AuditorConfig,
    runner: ProcessRunner,
}

impl StandardsAuditor {
    pub fn new(config: AuditorConfig) -> Self {
        Self {
            config,
            runner: ProcessRunner,
        }
    }

    /// Run the full fan-out, or print the plan in dry-run mode.
    pub async fn run(&self) -> OrchestrateResult<AuditSummary> {
        let started = Instant::now();

        let index_path = self.config.index_path();
        let index = std::fs::read_to_string(&index_path).map_err(|_| {
            OrchestrateError::Config(format!(
                "standards index missing: {}",
                index_path.display()
            ))
        })?;
        let standards = filter_standards(parse_index(&index)?, self.config.standards.as_deref());

        let template = std::fs::read_to_string(&self.config.template).map_err(|_| {
            OrchestrateError::Config(format!(
                "report template missing: {}",
                self.config.template.display()
            ))
        })?;

        if self.config.dry_run {
            println!("would audit {} standards:", standards.len());
            for standard in &standards {
                println!(
                    "  {}/{} -> {}",
                    standard.category,
                    standard.slug,
                    standard.report_path(&self.config.output_dir).display()
                );
            }
            return Ok(AuditSummary {
                results: Vec::new(),
                elapsed: started.elapsed(),
            });
        }

        std::fs::create_dir_all(&self.config.output_dir)?;

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let results: Arc<Mutex<Vec<StandardResult>>> = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();

        info!(
            standards = standards.len(),
            concurrency = self.config.concurrency,
            "standards audit started"
        );

        for standard in standards {
            let markdown_path = standard.markdown_path(&self.config.standards_dir);
            if !markdown_path.is_file() {
                warn!(slug = %standard.slug, "standard markdown missing; skipping");
                push_result(
                    &results,
                    StandardResult {
                        standard,
                        outcome: StandardOutcome::Skip,
                        elapsed: Duration::ZERO,
                    },
                );
                continue;
            }

            let semaphore = Arc::clone(&semaphore);
            let results = Arc::clone(&results);
            let runner = self.runner;
            let config = self.config.clone();
            let template = template.clone();

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return;
                };
                if cleanup::is_interrupted() {
                    return;
                }
                let outcome = audit_one(&runner, &config, &standard, &template).await;
                push_result(&results, outcome);
            }));
        }

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                warn!(error = %e, "auditor worker panicked");
            }
        }

        let results = match Arc::try_unwrap(results) {
            Ok(mutex) => mutex.into_inner().unwrap_or_default(),
            Err(shared) => shared.lock().map(|r| r.clone()).unwrap_or_default(),
        };
        Ok(AuditSummary {
            results,
            elapsed: started.elapsed(),
        })
    }
}

fn push_result(results: &Arc<Mutex<Vec<StandardResult>>>, result: StandardResult) {
    if let Ok(mut results) = results.lock() {
        results.push(result);
    }
}

/// Audit one standard: build the prompt, run the agent, classify by the
/// report file it was told to write.
async fn audit_one(
    runner: &ProcessRunner,
    config: &AuditorConfig,
    standard: &Standard,
    template: &str,
) -> StandardResult {
    let started = Instant::now();
    let report_path = standard.report_path(&config.output_dir);
    let markdown_path = standard.markdown_path(&config.standards_dir);

    // A leftover report from an earlier run must not count as this run's.
    let _ = std::fs::remove_file(&report_path);

    let standard_md = match std::fs::read_to_string(&markdown_path) {
        Ok(content) => content,
        Err(_) => {
            return StandardResult {
                standard: standard.clone(),
                outcome: StandardOutcome::Skip,
                elapsed: started.elapsed(),
            }
        }
    };

    let prompt = format!(
        "# Standards audit: {category}/{slug}\n\n\
         {description}\n\n\
         ## Standard\n\n{standard_md}\n\n\
         ## Report template\n\n{template}\n\n\
         Audit the repository against this standard and write a scored report \
         following the template to the report file.\n\n\
         Report file: {report}\n",
        category = standard.category,
        slug = standard.slug,
        description = standard.description,
        report = report_path.display(),
    );

    let mut argv: Vec<String> = config.cli.split_whitespace().map(str::to_string).collect();
    if let Some(ref model) = config.model {
        argv.push("--model".to_string());
        argv.push(model.clone());
    }

    let spec = CommandSpec {
        argv,
        cwd: None,
        stdin: Some(prompt.into_bytes()),
        capture_file: None,
    };

    debug!(slug = %standard.slug, "auditing standard");
    let outcome = match runner.run(spec, Some(config.timeout())).await {
        Ok(RunOutcome::TimedOut) => StandardOutcome::Timeout,
        Ok(RunOutcome::Completed { exit_code, .. }) => {
            let wrote_report = std::fs::metadata(&report_path)
                .map(|m| m.len() > 0)
                .unwrap_or(false);
            if wrote_report {
                StandardOutcome::Pass
            } else {
                StandardOutcome::Fail(exit_code)
            }
        }
        Err(e) => {
            warn!(slug = %standard.slug, error = %e, "audit invocation failed");
            StandardOutcome::Fail(-1)
        }
    };

    info!(slug = %standard.slug, outcome = %outcome, "standard audited");
    StandardResult {
        standard: standard.clone(),
        outcome,
        elapsed: started.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(slug: &str, outcome: StandardOutcome) -> StandardResult {
        StandardResult {
            standard: Standard {
                category: "style".to_string(),
                slug: slug.to_string(),
                description: String::new(),
            },
            outcome,
            elapsed: Duration::from_millis(1500),
        }
    }

    #[test]
    fn summary_counts_and_verdict() {
        let summary = AuditSummary {
            results: vec![
                result("a", StandardOutcome::Pass),
                result("b", StandardOutcome::Fail(2)),
                result("c", StandardOutcome::Timeout),
                result("d", StandardOutcome::Skip),
            ],
            elapsed: Duration::from_secs(5),
        };
        assert!(!summary.all_passed());
        let rendered = summary.render();
        assert!(rendered.contains("4 standards: 1 pass, 1 fail, 1 timeout, 1 skipped"));
        assert!(rendered.contains("FAIL (2)"));
        assert!(rendered.contains("TIMEOUT"));
    }

    #[test]
    fn skips_do_not_fail_the_run() {
        let summary = AuditSummary {
            results: vec![
                result("a", StandardOutcome::Pass),
                result("b", StandardOutcome::Skip),
            ],
            elapsed: Duration::from_secs(1),
        };
        assert!(summary.all_passed());
    }

    #[test]
    fn render_sorts_by_slug() {
        let summary = AuditSummary {
            results: vec![
                result("zeta", StandardOutcome::Pass),
                result("alpha", StandardOutcome::Pass),
            ],
            elapsed: Duration::from_secs(1),
        };
        let rendered = summary.render();
        let alpha = rendered.find("alpha").unwrap();
        let zeta = rendered.find("zeta").unwrap();
        assert!(alpha < zeta);
    }

    #[tokio::test]
    async fn missing_index_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = AuditorConfig {
            standards_dir: dir.path().join("nope"),
            ..AuditorConfig::default()
        };
        let err = StandardsAuditor::new(config).run().await.unwrap_err();
        assert!(err.to_string().contains("standards index missing"));
    }
}
