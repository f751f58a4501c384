//! Agent OS orchestration core
//!
//! The concurrency-safe driver behind the `orchestrate` and
//! `audit-standards` binaries:
//! - Cycle state machine over a spec folder (do-task, gates, audits, demo)
//! - Subprocess runner with timeouts and process-group termination
//! - Self-healing for spec mutation and checkbox drift
//! - Bounded-concurrency fan-out over a standards index

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;
