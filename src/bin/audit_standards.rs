//! `audit-standards` entry point
//!
//! Fans one agent invocation out per coding standard with bounded
//! concurrency and prints the aggregate table.

use std::process::ExitCode;

use clap::Parser;

use agentos::cli::AuditStandardsArgs;
use agentos::domain::errors::OrchestrateError;
use agentos::infrastructure::config::ConfigLoader;
use agentos::infrastructure::logging;
use agentos::infrastructure::process::cleanup;
use agentos::services::StandardsAuditor;

#[tokio::main]
async fn main() -> ExitCode {
    let args = AuditStandardsArgs::parse();
    logging::init(args.verbose);

    match run(args).await {
        Ok(all_passed) => {
            cleanup::run_cleanup();
            if all_passed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("audit-standards: {e}");
            cleanup::run_cleanup();
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(args: AuditStandardsArgs) -> Result<bool, OrchestrateError> {
    let config = args.apply(ConfigLoader::load_auditor(args.config.as_deref())?);
    ConfigLoader::validate_auditor(&config)?;
    let dry_run = config.dry_run;

    cleanup::install_signal_handlers();

    let summary = StandardsAuditor::new(config).run().await?;
    if dry_run {
        return Ok(true);
    }

    println!("{}", summary.render());
    Ok(summary.all_passed())
}
