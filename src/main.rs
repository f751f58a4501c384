//! `orchestrate` entry point
//!
//! Wires configuration, logging, the run lock, and signal handling around
//! one `Orchestrator::run` over the given spec folder.

use std::process::ExitCode;

use clap::Parser;

use agentos::cli::OrchestrateArgs;
use agentos::domain::errors::OrchestrateError;
use agentos::infrastructure::config::ConfigLoader;
use agentos::infrastructure::logging;
use agentos::infrastructure::process::cleanup;
use agentos::infrastructure::workspace::{RunLock, SpecFolder};
use agentos::services::Orchestrator;

#[tokio::main]
async fn main() -> ExitCode {
    let args = OrchestrateArgs::parse();
    logging::init(args.verbose);

    match run(args).await {
        Ok(()) => {
            cleanup::run_cleanup();
            ExitCode::SUCCESS
        }
        Err(e) => {
            // GateFailure carries the gate's captured output; everything
            // else is self-describing.
            if let OrchestrateError::GateFailure { ref output, .. } = e {
                eprintln!("{}", output.trim_end());
            }
            eprintln!("orchestrate: {e}");
            cleanup::run_cleanup();
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(args: OrchestrateArgs) -> Result<(), OrchestrateError> {
    let config = ConfigLoader::load_orchestrator(args.config.as_deref())?;

    let folder = SpecFolder::new(&args.spec_folder);
    folder.validate()?;

    // Exclusive per spec folder; held until exit.
    let _lock = RunLock::acquire(&folder)?;

    cleanup::install_signal_handlers();

    Orchestrator::new(folder, config).run().await
}
