//! The findings file: ranked keyword matches as JSON.
//!
//! `cscan search` writes it and `cscan report` reads it back, so the report
//! always reflects exactly what the last search produced.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::MatchResult;

/// Keyword counts followed by their `"total"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instances {
    #[serde(flatten)]
    pub keywords: IndexMap<String, usize>,
    pub total: usize,
}

/// One matched commit as stored in the findings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingRecord {
    pub sha: String,
    pub group: String,
    pub message: String,
    pub unique_finds: usize,
    pub instances: Instances,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub commit_date: String,
}

impl From<&MatchResult> for FindingRecord {
    fn from(result: &MatchResult) -> Self {
        Self {
            sha: result.record_id.clone(),
            group: result.group.clone(),
            message: result.message.clone(),
            unique_finds: result.unique_keyword_count,
            instances: Instances {
                keywords: result.matched_keywords.clone(),
                total: result.total_instances,
            },
            committer: result.committer.clone(),
            author: result.author.clone(),
            commit_date: result.timestamp.clone(),
        }
    }
}

impl FindingRecord {
    /// Matched keywords joined for display, e.g. `coin (2), blackcoin (1)`.
    pub fn keyword_list(&self) -> String {
        self.instances
            .keywords
            .iter()
            .map(|(k, n)| format!("{} ({})", k, n))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub fn write_findings(path: &Path, results: &[MatchResult]) -> Result<()> {
    let records: Vec<FindingRecord> = results.iter().map(FindingRecord::from).collect();
    let json = serde_json::to_string_pretty(&records)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write findings: {}", path.display()))?;
    Ok(())
}

pub fn read_findings(path: &Path) -> Result<Vec<FindingRecord>> {
    let content = std::fs::read_to_string(path).with_context(|| {
        format!(
            "Failed to read findings: {}. Run `cscan search` first?",
            path.display()
        )
    })?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse findings: {}", path.display()))
}
