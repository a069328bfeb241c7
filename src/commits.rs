//! Commit dump parsing: the ingestion boundary.
//!
//! A commit dump is a JSON object keyed by repository name whose values are
//! arrays of commits. Two commit shapes are accepted:
//!
//! - the forge API shape:
//!   `{"sha": "...", "commit": {"message": "...", "committer": {"name", "email", "date"}, "author": {...}}}`
//! - a flat shape: `{"id": "...", "message": "...", "committer": {...}, "author": {...}, "date": "..."}`
//!
//! Every field is optional. Defaults are resolved here, once, so the
//! matcher and aggregator never deal with missing data.

use anyhow::{Context, Result};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::models::{Person, RecordGroup, TextRecord, UNKNOWN};
use crate::traits::RecordSource;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawCommit {
    #[serde(deserialize_with = "lenient")]
    sha: Option<String>,
    id: Option<Value>,
    #[serde(deserialize_with = "lenient")]
    message: Option<String>,
    #[serde(deserialize_with = "lenient")]
    date: Option<String>,
    #[serde(deserialize_with = "lenient")]
    commit: Option<RawCommitDetail>,
    #[serde(deserialize_with = "lenient")]
    committer: Option<RawIdentity>,
    #[serde(deserialize_with = "lenient")]
    author: Option<RawIdentity>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawCommitDetail {
    #[serde(deserialize_with = "lenient")]
    message: Option<String>,
    #[serde(deserialize_with = "lenient")]
    committer: Option<RawIdentity>,
    #[serde(deserialize_with = "lenient")]
    author: Option<RawIdentity>,
}

/// Either a git signature (`name`/`email`/`date`) or a forge user (`login`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawIdentity {
    #[serde(deserialize_with = "lenient")]
    name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    email: Option<String>,
    #[serde(deserialize_with = "lenient")]
    date: Option<String>,
    #[serde(deserialize_with = "lenient")]
    login: Option<String>,
}

/// A field of the wrong type reads as absent instead of failing the commit.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

impl RawIdentity {
    fn person(&self) -> Person {
        Person {
            name: self.name.clone().or_else(|| self.login.clone()),
            email: self.email.clone(),
        }
    }
}

/// One repository of a dump with its commits kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct DumpGroup {
    pub name: String,
    pub commits: Vec<Value>,
}

impl DumpGroup {
    pub fn records(&self) -> Vec<TextRecord> {
        self.commits
            .iter()
            .filter(|c| !c.is_null())
            .map(|c| to_record(&self.name, c))
            .collect()
    }

    pub fn to_record_group(&self) -> RecordGroup {
        RecordGroup::new(self.name.clone(), self.records())
    }
}

/// Normalize one commit value.
pub fn to_record(group: &str, value: &Value) -> TextRecord {
    let raw: RawCommit = match serde_json::from_value(value.clone()) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(repo = group, error = %e, "malformed commit; using defaults");
            RawCommit::default()
        }
    };

    let detail = raw.commit.unwrap_or_default();

    let id = raw
        .sha
        .or_else(|| raw.id.as_ref().and_then(value_to_string))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string());

    let message = detail.message.or(raw.message).unwrap_or_default();

    let timestamp = detail
        .committer
        .as_ref()
        .and_then(|c| c.date.clone())
        .or_else(|| detail.author.as_ref().and_then(|a| a.date.clone()))
        .or(raw.date)
        .or_else(|| raw.committer.as_ref().and_then(|c| c.date.clone()));

    let committer = detail
        .committer
        .as_ref()
        .or(raw.committer.as_ref())
        .map(RawIdentity::person);
    let author = detail
        .author
        .as_ref()
        .or(raw.author.as_ref())
        .map(RawIdentity::person);

    TextRecord {
        id,
        group: group.to_string(),
        message,
        committer,
        author,
        timestamp,
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a dump, keeping repository order and raw commit values.
pub fn parse_dump(json: &str) -> Result<Vec<DumpGroup>> {
    let raw: IndexMap<String, Value> = serde_json::from_str(json)
        .context("Commit dump must be a JSON object keyed by repository name")?;

    Ok(raw
        .into_iter()
        .map(|(name, commits)| {
            let commits = match commits {
                Value::Array(items) => items,
                Value::Null => Vec::new(),
                other => {
                    tracing::warn!(
                        repo = %name,
                        kind = json_kind(&other),
                        "expected an array of commits; treating repository as empty"
                    );
                    Vec::new()
                }
            };
            DumpGroup { name, commits }
        })
        .collect())
}

/// Parse a dump straight into record groups.
pub fn parse_groups(json: &str) -> Result<Vec<RecordGroup>> {
    Ok(parse_dump(json)?
        .iter()
        .map(DumpGroup::to_record_group)
        .collect())
}

/// Serialize groups back into the dump shape (pretty-printed).
pub fn dump_to_json(groups: &[DumpGroup]) -> Result<String> {
    let object: serde_json::Map<String, Value> = groups
        .iter()
        .map(|g| (g.name.clone(), Value::Array(g.commits.clone())))
        .collect();
    Ok(serde_json::to_string_pretty(&Value::Object(object))?)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Reads commits from a dump file on disk.
pub struct JsonFileSource {
    path: PathBuf,
    label: String,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let label = path.display().to_string();
        Self { path, label }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecordSource for JsonFileSource {
    fn name(&self) -> &str {
        &self.label
    }

    async fn load_groups(&self) -> Result<Vec<RecordGroup>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read commit dump: {}", self.path.display()))?;
        parse_groups(&content)
            .with_context(|| format!("Failed to parse commit dump: {}", self.path.display()))
    }
}
