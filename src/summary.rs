//! Per-repository commit summary.
//!
//! Counts commits and distinct committer/author e-mail addresses for each
//! repository, plus totals across the whole organisation. Used by
//! `cscan summary` and by the first sheet of the report.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;

use crate::config::Config;
use crate::models::{Person, RecordGroup};
use crate::traits::RecordSource;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSummary {
    pub repository: String,
    pub commit_count: usize,
    pub committer_count: usize,
    pub author_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommitSummary {
    pub repos: Vec<RepoSummary>,
    pub total_commits: usize,
    /// Distinct committer e-mails across all repositories.
    pub total_committers: usize,
    /// Distinct author e-mails across all repositories.
    pub total_authors: usize,
}

pub fn summarize(groups: &[RecordGroup]) -> CommitSummary {
    let mut all_committers = HashSet::new();
    let mut all_authors = HashSet::new();
    let mut summary = CommitSummary::default();

    for group in groups {
        let mut committers = HashSet::new();
        let mut authors = HashSet::new();

        for record in &group.records {
            if let Some(email) = email(record.committer.as_ref()) {
                committers.insert(email);
                all_committers.insert(email);
            }
            if let Some(email) = email(record.author.as_ref()) {
                authors.insert(email);
                all_authors.insert(email);
            }
        }

        summary.total_commits += group.records.len();
        summary.repos.push(RepoSummary {
            repository: group.name.clone(),
            commit_count: group.records.len(),
            committer_count: committers.len(),
            author_count: authors.len(),
        });
    }

    summary.total_committers = all_committers.len();
    summary.total_authors = all_authors.len();
    summary
}

fn email(person: Option<&Person>) -> Option<&str> {
    person
        .and_then(|p| p.email.as_deref())
        .filter(|e| !e.is_empty())
}

/// Plain-text rendering, also written to the analysis file.
pub fn render_text(summary: &CommitSummary) -> String {
    let mut out = String::from("Commit Analysis Report:\n\n");

    for repo in &summary.repos {
        let _ = write!(
            out,
            "Repository: {}\n - Total commits: {}\n - Unique committers: {}\n - Unique authors: {}\n\n",
            repo.repository, repo.commit_count, repo.committer_count, repo.author_count
        );
    }

    let _ = write!(
        out,
        "Overall Summary:\n - Total commits across all repositories: {}\n - Total unique committers across all repositories: {}\n - Total unique authors across all repositories: {}\n",
        summary.total_commits, summary.total_committers, summary.total_authors
    );

    out
}

/// Summarize the source, print the report and write it to `output`
/// (default: the configured analysis file).
pub async fn run_summary(
    config: &Config,
    source: &dyn RecordSource,
    output: Option<&Path>,
) -> Result<CommitSummary> {
    let groups = source.load_groups().await?;
    let summary = summarize(&groups);
    let text = render_text(&summary);

    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.files.analysis_path());
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, &text)
        .with_context(|| format!("Failed to write summary: {}", path.display()))?;

    print!("{}", text);
    tracing::info!(
        source = source.name(),
        repos = summary.repos.len(),
        path = %path.display(),
        "summary written"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TextRecord;

    fn record(committer: Option<&str>, author: Option<&str>) -> TextRecord {
        let person = |email: Option<&str>| {
            email.map(|e| Person {
                name: None,
                email: Some(e.to_string()),
            })
        };
        TextRecord {
            committer: person(committer),
            author: person(author),
            ..TextRecord::new("1", "r", "m")
        }
    }

    #[test]
    fn counts_distinct_emails_per_repo_and_overall() {
        let groups = vec![
            RecordGroup::new(
                "a",
                vec![
                    record(Some("x@e"), Some("y@e")),
                    record(Some("x@e"), Some("z@e")),
                    record(None, Some("")),
                ],
            ),
            RecordGroup::new("b", vec![record(Some("w@e"), Some("y@e"))]),
            RecordGroup::new("empty", vec![]),
        ];

        let summary = summarize(&groups);
        assert_eq!(
            summary.repos[0],
            RepoSummary {
                repository: "a".to_string(),
                commit_count: 3,
                committer_count: 1,
                author_count: 2,
            }
        );
        assert_eq!(summary.repos[2].commit_count, 0);
        assert_eq!(summary.total_commits, 4);
        assert_eq!(summary.total_committers, 2);
        assert_eq!(summary.total_authors, 2);
    }

    #[test]
    fn text_report_lists_repos_then_totals() {
        let summary = summarize(&[RecordGroup::new("core", vec![record(Some("a@e"), None)])]);
        let text = render_text(&summary);
        assert!(text.starts_with("Commit Analysis Report:\n\nRepository: core\n"));
        assert!(text.contains(" - Unique committers: 1\n"));
        assert!(text.ends_with("Total unique authors across all repositories: 0\n"));
    }
}
