//! Standards index parsing for the parallel auditor.
//!
//! The index is a two-level YAML document: category → standard slug →
//! `{ description }`. Comments and blank lines are the YAML parser's
//! problem, not ours.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::domain::errors::{OrchestrateError, OrchestrateResult};

/// One selected standard from the index, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standard {
    pub category: String,
    pub slug: String,
    pub description: String,
}

impl Standard {
    /// Path of this standard's markdown file under the standards directory.
    pub fn markdown_path(&self, standards_dir: &Path) -> PathBuf {
        standards_dir
            .join(&self.category)
            .join(format!("{}.md", self.slug))
    }

    /// Path of this standard's report under the output directory.
    pub fn report_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(format!("{}.md", self.slug))
    }
}

#[derive(Debug, Deserialize)]
struct StandardEntry {
    #[serde(default)]
    description: String,
}

/// Parse the index, preserving file order.
pub fn parse_index(content: &str) -> OrchestrateResult<Vec<Standard>> {
    // serde_yaml's Mapping keeps insertion order, which is the file order
    // the auditor schedules in.
    let doc: serde_yaml::Mapping = serde_yaml::from_str(content)
        .map_err(|e| OrchestrateError::Config(format!("invalid standards index: {e}")))?;

    let mut standards = Vec::new();
    for (category, entries) in doc {
        let Some(category) = category.as_str().map(str::to_string) else {
            continue;
        };
        let Ok(entries) =
            serde_yaml::from_value::<serde_yaml::Mapping>(entries)
        else {
            continue;
        };
        for (slug, entry) in entries {
            let Some(slug) = slug.as_str().map(str::to_string) else {
                continue;
            };
            let entry: StandardEntry = serde_yaml::from_value(entry).map_err(|e| {
                OrchestrateError::Config(format!("invalid entry for standard '{slug}': {e}"))
            })?;
            standards.push(Standard {
                category: category.clone(),
                slug,
                description: entry.description,
            });
        }
    }
    Ok(standards)
}

/// Keep only the slugs named in a comma-separated allow-list.
///
/// `None` or an all-whitespace list selects everything.
pub fn filter_standards(standards: Vec<Standard>, allow: Option<&str>) -> Vec<Standard> {
    let Some(allow) = allow else {
        return standards;
    };
    let wanted: HashSet<&str> = allow
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if wanted.is_empty() {
        return standards;
    }
    standards
        .into_iter()
        .filter(|s| wanted.contains(s.slug.as_str()))
        .collect()
}
