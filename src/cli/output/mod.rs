//! CLI output formatting module
//!
//! Terminal progress reporting for the orchestrator and auditor binaries.

pub mod progress;

pub use progress::ProgressReporter;
