//! Core data models used throughout commit-scan.
//!
//! These types represent the commit records that flow in from a record
//! source and the keyword findings that flow out of the aggregator.

use indexmap::IndexMap;

/// Placeholder rendered for metadata the forge did not supply.
pub const UNKNOWN: &str = "unknown";

/// A commit identity (committer or author) as reported by the forge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Person {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl Person {
    /// Display name, falling back to [`UNKNOWN`].
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(UNKNOWN)
    }
}

/// A single commit, normalized at the ingestion boundary.
///
/// Absent fields have already been resolved: a missing message is the
/// empty string and a missing id is [`UNKNOWN`]. Optional metadata stays
/// optional so consumers decide how to render it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRecord {
    pub id: String,
    pub group: String,
    pub message: String,
    pub committer: Option<Person>,
    pub author: Option<Person>,
    /// ISO-8601 commit timestamp as supplied by the forge.
    pub timestamp: Option<String>,
}

impl TextRecord {
    pub fn new(id: impl Into<String>, group: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            group: group.into(),
            message: message.into(),
            committer: None,
            author: None,
            timestamp: None,
        }
    }

    pub fn committer_name(&self) -> &str {
        self.committer
            .as_ref()
            .map(Person::display_name)
            .unwrap_or(UNKNOWN)
    }

    pub fn author_name(&self) -> &str {
        self.author
            .as_ref()
            .map(Person::display_name)
            .unwrap_or(UNKNOWN)
    }

    pub fn timestamp_or_unknown(&self) -> &str {
        self.timestamp.as_deref().unwrap_or(UNKNOWN)
    }
}

/// All commits of one repository, in the order the source supplied them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordGroup {
    pub name: String,
    pub records: Vec<TextRecord>,
}

impl RecordGroup {
    pub fn new(name: impl Into<String>, records: Vec<TextRecord>) -> Self {
        Self {
            name: name.into(),
            records,
        }
    }
}

/// Keyword findings for one commit.
///
/// Produced by the aggregator only when at least one keyword survived
/// containment suppression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub record_id: String,
    pub group: String,
    pub message: String,
    /// Matched keyword (as configured) to its final count, in keyword order.
    pub matched_keywords: IndexMap<String, usize>,
    pub unique_keyword_count: usize,
    pub total_instances: usize,
    /// Present only when committers were requested.
    pub committer: Option<String>,
    /// Present only when authors were requested.
    pub author: Option<String>,
    pub timestamp: String,
}
