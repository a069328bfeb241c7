//! Result aggregation and ranking.
//!
//! Runs the keyword matcher over every commit of every non-excluded
//! repository, attaches the requested metadata, and ranks the findings with
//! a single stable sort so equal keys keep their discovery order
//! (repository order, then commit order).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::config::SearchConfig;
use crate::matcher::KeywordMatcher;
use crate::models::{MatchResult, RecordGroup};

/// Ranking key for the findings, always descending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum SortKey {
    #[default]
    TotalInstances,
    UniqueKeywords,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown sort key '{0}': expected 'total_instances' or 'unique_keywords'")]
pub struct ParseSortKeyError(String);

impl FromStr for SortKey {
    type Err = ParseSortKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "total_instances" | "total" => Ok(SortKey::TotalInstances),
            "unique_keywords" | "unique_finds" | "unique" => Ok(SortKey::UniqueKeywords),
            _ => Err(ParseSortKeyError(s.to_string())),
        }
    }
}

impl TryFrom<String> for SortKey {
    type Error = ParseSortKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortKey::TotalInstances => f.write_str("total_instances"),
            SortKey::UniqueKeywords => f.write_str("unique_keywords"),
        }
    }
}

impl SortKey {
    fn key(&self, result: &MatchResult) -> usize {
        match self {
            SortKey::TotalInstances => result.total_instances,
            SortKey::UniqueKeywords => result.unique_keyword_count,
        }
    }
}

/// Ranked findings plus tallies over the scanned (non-excluded) repositories.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub results: Vec<MatchResult>,
    pub groups_scanned: usize,
    pub records_scanned: usize,
}

/// Scan `groups` with the `[search]` settings and rank the findings.
pub fn scan(groups: &[RecordGroup], search: &SearchConfig) -> Result<SearchOutcome> {
    let matcher = KeywordMatcher::new(&search.keywords, search.matching)
        .context("Failed to compile keyword patterns")?;

    let mut outcome = SearchOutcome::default();

    for group in groups {
        if search.exclude_repos.contains(&group.name) {
            tracing::debug!(repo = %group.name, "skipping excluded repository");
            continue;
        }
        outcome.groups_scanned += 1;

        for record in &group.records {
            outcome.records_scanned += 1;

            let Some(analysis) = matcher.analyze(&record.message) else {
                continue;
            };

            outcome.results.push(MatchResult {
                record_id: record.id.clone(),
                group: group.name.clone(),
                message: record.message.clone(),
                unique_keyword_count: analysis.unique_keywords(),
                total_instances: analysis.total_instances,
                matched_keywords: analysis.counts,
                committer: search
                    .include_committer
                    .then(|| record.committer_name().to_string()),
                author: search
                    .include_author
                    .then(|| record.author_name().to_string()),
                timestamp: record.timestamp_or_unknown().to_string(),
            });
        }
    }

    rank(&mut outcome.results, search.sort_by);

    tracing::info!(
        groups = outcome.groups_scanned,
        records = outcome.records_scanned,
        findings = outcome.results.len(),
        "keyword scan complete"
    );

    Ok(outcome)
}

/// Ranked findings only.
pub fn aggregate(groups: &[RecordGroup], search: &SearchConfig) -> Result<Vec<MatchResult>> {
    Ok(scan(groups, search)?.results)
}

/// Stable descending sort by `key`.
pub fn rank(results: &mut [MatchResult], key: SortKey) {
    results.sort_by(|a, b| key.key(b).cmp(&key.key(a)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::MatchConfig;
    use crate::models::{Person, TextRecord};

    fn search(keywords: &[&str]) -> SearchConfig {
        SearchConfig {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            ..SearchConfig::default()
        }
    }

    fn group(name: &str, messages: &[(&str, &str)]) -> RecordGroup {
        RecordGroup::new(
            name,
            messages
                .iter()
                .map(|(id, msg)| TextRecord::new(*id, name, *msg))
                .collect(),
        )
    }

    #[test]
    fn sort_key_parses_known_values() {
        assert_eq!("total_instances".parse::<SortKey>().unwrap(), SortKey::TotalInstances);
        assert_eq!("unique-keywords".parse::<SortKey>().unwrap(), SortKey::UniqueKeywords);
        assert_eq!("Unique_Finds".parse::<SortKey>().unwrap(), SortKey::UniqueKeywords);
    }

    #[test]
    fn sort_key_rejects_unknown_value() {
        let err = "newest".parse::<SortKey>().unwrap_err();
        assert!(err.to_string().contains("newest"));
        assert!(err.to_string().contains("total_instances"));
    }

    #[test]
    fn excluded_groups_are_skipped_entirely() {
        let mut cfg = search(&["coin"]);
        cfg.exclude_repos.insert("vendor".to_string());
        let groups = vec![
            group("vendor", &[("1", "coin"), ("2", "coin")]),
            group("core", &[("3", "coin"), ("4", "docs")]),
        ];

        let outcome = scan(&groups, &cfg).unwrap();
        assert_eq!(outcome.groups_scanned, 1);
        assert_eq!(outcome.records_scanned, 2);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].record_id, "3");
    }

    #[test]
    fn ties_keep_discovery_order() {
        let mut cfg = search(&["coin", "fix"]);
        cfg.matching = MatchConfig {
            count_once_per_keyword: false,
            ..MatchConfig::default()
        };
        let groups = vec![
            group("a", &[("a1", "coin"), ("a2", "coin fix fix")]),
            group("b", &[("b1", "fix"), ("b2", "coin coin coin")]),
        ];

        let ids: Vec<String> = aggregate(&groups, &cfg)
            .unwrap()
            .into_iter()
            .map(|r| r.record_id)
            .collect();
        assert_eq!(ids, vec!["a2", "b2", "a1", "b1"]);
    }

    #[test]
    fn ranks_by_unique_keywords() {
        let mut cfg = search(&["coin", "fix", "docs"]);
        cfg.matching.count_once_per_keyword = false;
        cfg.sort_by = SortKey::UniqueKeywords;
        let groups = vec![group(
            "a",
            &[("1", "coin coin coin coin"), ("2", "coin fix docs"), ("3", "fix docs")],
        )];

        let ids: Vec<String> = aggregate(&groups, &cfg)
            .unwrap()
            .into_iter()
            .map(|r| r.record_id)
            .collect();
        assert_eq!(ids, vec!["2", "3", "1"]);
    }

    #[test]
    fn metadata_follows_flags_and_defaults_to_unknown() {
        let mut record = TextRecord::new("1", "a", "coin");
        record.committer = Some(Person {
            name: Some("Jo".to_string()),
            email: None,
        });
        let groups = vec![RecordGroup::new("a", vec![record])];

        let mut cfg = search(&["coin"]);
        let result = &aggregate(&groups, &cfg).unwrap()[0];
        assert_eq!(result.committer.as_deref(), Some("Jo"));
        assert_eq!(result.author.as_deref(), Some("unknown"));
        assert_eq!(result.timestamp, "unknown");

        cfg.include_committer = false;
        cfg.include_author = false;
        let result = &aggregate(&groups, &cfg).unwrap()[0];
        assert!(result.committer.is_none());
        assert!(result.author.is_none());
    }

    #[test]
    fn same_commit_in_two_groups_yields_two_results() {
        let cfg = search(&["coin"]);
        let groups = vec![group("a", &[("1", "coin")]), group("b", &[("1", "coin")])];
        assert_eq!(aggregate(&groups, &cfg).unwrap().len(), 2);
    }
}
