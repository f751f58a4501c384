//! Application services for the Agent OS orchestrator.

pub mod agent_invoker;
pub mod orchestrator;
pub mod self_heal;
pub mod standards_auditor;

pub use agent_invoker::{AgentInvoker, AgentOutcome};
pub use orchestrator::Orchestrator;
pub use standards_auditor::{AuditSummary, StandardOutcome, StandardsAuditor};
