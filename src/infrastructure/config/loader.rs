//! Layered configuration loading.
//!
//! Precedence, lowest to highest:
//! 1. Programmatic defaults (`Serialized`)
//! 2. Environment variables (`ORCHESTRATE_*` / `AUDIT_STANDARDS_*`)
//! 3. Shell-style `KEY=value` config file passed with `--config`
//!
//! The file outranks the environment on purpose: it is explicit operator
//! intent for this run. Keys are matched case-insensitively with `_` and
//! `-` ignored, so `doCli`, `DO_CLI`, and `do-cli` all land on `do_cli`.

use std::collections::BTreeMap;
use std::path::Path;

use figment::providers::{Env, Serialized};
use figment::Figment;

use crate::domain::errors::{OrchestrateError, OrchestrateResult};
use crate::domain::models::{AuditorConfig, OrchestratorConfig};

/// How a config value must be coerced before figment sees it.
#[derive(Clone, Copy)]
enum FieldKind {
    Str,
    Num,
    Bool,
}

/// Recognized orchestrator file keys: normalized key → (field, kind).
const ORCHESTRATOR_FIELDS: &[(&str, &str, FieldKind)] = &[
    ("cli", "cli", FieldKind::Str),
    ("docli", "do_cli", FieldKind::Str),
    ("auditcli", "audit_cli", FieldKind::Str),
    ("democli", "demo_cli", FieldKind::Str),
    ("speccli", "spec_cli", FieldKind::Str),
    ("domodel", "do_model", FieldKind::Str),
    ("auditmodel", "audit_model", FieldKind::Str),
    ("demomodel", "demo_model", FieldKind::Str),
    ("specmodel", "spec_model", FieldKind::Str),
    ("taskgate", "task_gate", FieldKind::Str),
    ("specgate", "spec_gate", FieldKind::Str),
    ("maxcycles", "max_cycles", FieldKind::Num),
    ("commandsdir", "commands_dir", FieldKind::Str),
    ("agenttimeout", "agent_timeout", FieldKind::Num),
    ("maxtaskretries", "max_task_retries", FieldKind::Num),
    ("stalelimit", "stale_limit", FieldKind::Num),
    ("signalfallback", "signal_fallback", FieldKind::Bool),
    ("checkboxheal", "checkbox_heal", FieldKind::Bool),
];

/// Recognized auditor file keys.
const AUDITOR_FIELDS: &[(&str, &str, FieldKind)] = &[
    ("cli", "cli", FieldKind::Str),
    ("model", "model", FieldKind::Str),
    ("concurrency", "concurrency", FieldKind::Num),
    ("timeout", "timeout", FieldKind::Num),
    ("standardsdir", "standards_dir", FieldKind::Str),
    ("indexfile", "index_file", FieldKind::Str),
    ("template", "template", FieldKind::Str),
    ("outputdir", "output_dir", FieldKind::Str),
    ("standards", "standards", FieldKind::Str),
    ("dryrun", "dry_run", FieldKind::Bool),
];

/// Configuration loader with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load orchestrator configuration, optionally layering a config file.
    pub fn load_orchestrator(
        config_file: Option<&Path>,
    ) -> OrchestrateResult<OrchestratorConfig> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(OrchestratorConfig::default()))
            .merge(Env::prefixed("ORCHESTRATE_"));

        if let Some(path) = config_file {
            figment = figment.merge(Serialized::defaults(Self::file_values(
                path,
                ORCHESTRATOR_FIELDS,
            )?));
        }

        let config: OrchestratorConfig = figment
            .extract()
            .map_err(|e| OrchestrateError::Config(e.to_string()))?;
        Self::validate_orchestrator(&config)?;
        Ok(config)
    }

    /// Load auditor configuration, optionally layering a config file.
    pub fn load_auditor(config_file: Option<&Path>) -> OrchestrateResult<AuditorConfig> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(AuditorConfig::default()))
            .merge(Env::prefixed("AUDIT_STANDARDS_"));

        if let Some(path) = config_file {
            figment =
                figment.merge(Serialized::defaults(Self::file_values(path, AUDITOR_FIELDS)?));
        }

        let config: AuditorConfig = figment
            .extract()
            .map_err(|e| OrchestrateError::Config(e.to_string()))?;
        Self::validate_auditor(&config)?;
        Ok(config)
    }

    /// Validate orchestrator configuration after loading.
    pub fn validate_orchestrator(config: &OrchestratorConfig) -> OrchestrateResult<()> {
        if config.cli.trim().is_empty() || config.audit_cli.trim().is_empty() {
            return Err(OrchestrateError::Config(
                "agent CLI command must not be empty".to_string(),
            ));
        }
        if config.max_cycles == 0 {
            return Err(OrchestrateError::Config(
                "maxCycles must be at least 1".to_string(),
            ));
        }
        if config.agent_timeout == 0 {
            return Err(OrchestrateError::Config(
                "agentTimeout must be at least 1 second".to_string(),
            ));
        }
        if config.max_task_retries == 0 {
            return Err(OrchestrateError::Config(
                "maxTaskRetries must be at least 1".to_string(),
            ));
        }
        if config.stale_limit == 0 {
            return Err(OrchestrateError::Config(
                "staleLimit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate auditor configuration after loading.
    pub fn validate_auditor(config: &AuditorConfig) -> OrchestrateResult<()> {
        if config.concurrency == 0 || config.concurrency > 64 {
            return Err(OrchestrateError::Config(format!(
                "concurrency {} out of range (1..=64)",
                config.concurrency
            )));
        }
        if config.timeout == 0 {
            return Err(OrchestrateError::Config(
                "timeout must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse a shell-style `KEY=value` file into field values figment can
    /// merge. Unknown keys are configuration errors, not typos to ignore.
    fn file_values(
        path: &Path,
        fields: &[(&str, &str, FieldKind)],
    ) -> OrchestrateResult<BTreeMap<String, serde_json::Value>> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            OrchestrateError::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;

        let mut values = BTreeMap::new();
        for (lineno, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = line.strip_prefix("export ").unwrap_or(line);
            let Some((key, value)) = line.split_once('=') else {
                return Err(OrchestrateError::Config(format!(
                    "{}:{}: expected KEY=value, got '{raw}'",
                    path.display(),
                    lineno + 1
                )));
            };

            let normalized = normalize_key(key);
            let Some((_, field, kind)) = fields.iter().find(|(k, _, _)| *k == normalized) else {
                return Err(OrchestrateError::Config(format!(
                    "{}:{}: unknown option '{}'",
                    path.display(),
                    lineno + 1,
                    key.trim()
                )));
            };

            let value = unquote(value.trim());
            values.insert((*field).to_string(), coerce(field, value, *kind, path, lineno)?);
        }
        Ok(values)
    }
}

fn normalize_key(key: &str) -> String {
    key.trim()
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && bytes[bytes.len() - 1] == bytes[0]
    {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

fn coerce(
    field: &str,
    value: &str,
    kind: FieldKind,
    path: &Path,
    lineno: usize,
) -> OrchestrateResult<serde_json::Value> {
    match kind {
        FieldKind::Str => Ok(serde_json::Value::String(value.to_string())),
        FieldKind::Num => value
            .parse::<u64>()
            .map(serde_json::Value::from)
            .map_err(|_| {
                OrchestrateError::Config(format!(
                    "{}:{}: {field} expects a number, got '{value}'",
                    path.display(),
                    lineno + 1
                ))
            }),
        FieldKind::Bool => match value {
            "true" | "1" | "yes" => Ok(serde_json::Value::Bool(true)),
            "false" | "0" | "no" => Ok(serde_json::Value::Bool(false)),
            _ => Err(OrchestrateError::Config(format!(
                "{}:{}: {field} expects true/false, got '{value}'",
                path.display(),
                lineno + 1
            ))),
        },
    }
}
