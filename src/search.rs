//! Keyword search command.
//!
//! Loads commits from a record source, runs the keyword scan, writes the
//! ranked findings file and prints the top results.

use anyhow::{bail, Result};
use std::path::PathBuf;

use crate::aggregate::{self, SortKey};
use crate::config::Config;
use crate::findings;
use crate::models::MatchResult;
use crate::traits::RecordSource;

#[derive(Debug, Default, Clone)]
pub struct SearchOptions {
    /// Findings file (default: the configured one).
    pub output: Option<PathBuf>,
    /// Overrides `search.sort_by`.
    pub sort_by: Option<SortKey>,
    /// Printed results only; the findings file always holds every match.
    pub limit: Option<usize>,
}

pub async fn run_search(
    config: &Config,
    source: &dyn RecordSource,
    options: &SearchOptions,
) -> Result<Vec<MatchResult>> {
    if config.search.keywords.is_empty() {
        bail!("search.keywords is empty. Add keywords to the [search] section of the config.");
    }

    let mut search = config.search.clone();
    if let Some(key) = options.sort_by {
        search.sort_by = key;
    }

    let groups = source.load_groups().await?;
    let outcome = aggregate::scan(&groups, &search)?;

    let path = options
        .output
        .clone()
        .unwrap_or_else(|| config.files.findings_path());
    findings::write_findings(&path, &outcome.results)?;

    println!(
        "search {}  ({} repositories, {} commits, sorted by {})",
        source.name(),
        outcome.groups_scanned,
        outcome.records_scanned,
        search.sort_by
    );

    if outcome.results.is_empty() {
        println!("No results.");
    }

    let shown = options.limit.unwrap_or(outcome.results.len());
    for (i, result) in outcome.results.iter().take(shown).enumerate() {
        print_result(i + 1, result);
    }
    if shown < outcome.results.len() {
        println!("... {} more", outcome.results.len() - shown);
    }

    println!(
        "Saved {} matching commits to {}",
        outcome.results.len(),
        path.display()
    );

    Ok(outcome.results)
}

fn print_result(rank: usize, result: &MatchResult) {
    let first_line = result.message.lines().next().unwrap_or_default().trim();
    println!(
        "{}. [{} / {}] {} / {}",
        rank, result.total_instances, result.unique_keyword_count, result.group, first_line
    );

    let keywords: Vec<String> = result
        .matched_keywords
        .iter()
        .map(|(k, n)| format!("{} ({})", k, n))
        .collect();
    println!("    keywords: {}", keywords.join(", "));
    println!("    date: {}", result.timestamp);
    if let Some(ref committer) = result.committer {
        println!("    committer: {}", committer);
    }
    if let Some(ref author) = result.author {
        println!("    author: {}", author);
    }
    println!("    sha: {}", result.record_id);
    println!();
}
