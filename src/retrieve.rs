//! Organisation retrieval: forge → record store.
//!
//! Lists the organisation's repositories, fetches each one's commits and
//! writes them to the store in discovery order. Incremental runs pass the
//! last checkpoint as `since` and merge the new commits ahead of the stored
//! ones; `--full` refetches everything.

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, SecondsFormat, Utc};

use crate::commits::DumpGroup;
use crate::config::Config;
use crate::db;
use crate::github::ForgeClient;
use crate::migrate;
use crate::progress::{RetrieveProgressEvent, RetrieveProgressReporter};
use crate::store::{self, WriteMode};

/// Options for a single retrieval run.
#[derive(Debug, Default, Clone)]
pub struct RetrieveOptions {
    /// Ignore the checkpoint and refetch everything.
    pub full: bool,
    /// Only commits after this date (`YYYY-MM-DD`); overrides the checkpoint.
    pub since: Option<String>,
    /// Only these repositories (all when empty).
    pub repos: Vec<String>,
    /// List repositories without fetching commits or writing.
    pub dry_run: bool,
}

pub fn checkpoint_key(org: &str) -> String {
    format!("github:{}", org)
}

pub async fn run_retrieve(
    config: &Config,
    options: &RetrieveOptions,
    progress: &dyn RetrieveProgressReporter,
) -> Result<()> {
    let org = config.retrieve.org.trim();
    if org.is_empty() {
        bail!("retrieve.org is not set. Add it to the [retrieve] section of the config.");
    }

    let since_override = options
        .since
        .as_deref()
        .map(since_to_timestamp)
        .transpose()?;

    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;

    let key = checkpoint_key(org);
    let since = match since_override {
        Some(ts) => Some(ts),
        None if options.full => None,
        None => store::get_checkpoint(&pool, &key).await?,
    };
    let mode = if since.is_some() {
        WriteMode::Merge
    } else {
        WriteMode::Replace
    };

    let started = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    let client = ForgeClient::new(&config.retrieve)?;

    progress.report(RetrieveProgressEvent::Discovering {
        org: org.to_string(),
    });
    let mut repos = client
        .list_repositories()
        .await
        .with_context(|| format!("Failed to list repositories of '{}'", org))?;

    if !options.repos.is_empty() {
        repos.retain(|name| options.repos.iter().any(|r| r == name));
    }

    if options.dry_run {
        println!("retrieve {} (dry-run)", org);
        println!("  repositories found: {}", repos.len());
        for name in &repos {
            println!("    {}", name);
        }
        if let Some(ref ts) = since {
            println!("  since: {}", ts);
        }
        pool.close().await;
        return Ok(());
    }

    let total = repos.len() as u64;
    let mut commits_written = 0u64;
    let mut incomplete = Vec::new();

    for (i, name) in repos.iter().enumerate() {
        progress.report(RetrieveProgressEvent::Fetching {
            repo: name.clone(),
            n: i as u64 + 1,
            total,
        });

        let pages = client.list_commits(name, since.as_deref()).await;
        if pages.incomplete.is_some() {
            incomplete.push(name.clone());
        }

        let group = DumpGroup {
            name: name.clone(),
            commits: pages.commits,
        };
        let written = store::upsert_group(&pool, i as i64, &group, mode)
            .await
            .with_context(|| format!("Failed to store commits of '{}'", name))?;
        commits_written += written;

        progress.report(RetrieveProgressEvent::Fetched {
            repo: name.clone(),
            commits: written,
        });
        tracing::info!(repo = %name, commits = written, "repository retrieved");
    }

    // Only a complete, unfiltered run advances the checkpoint
    let checkpoint = if incomplete.is_empty() && options.repos.is_empty() {
        store::set_checkpoint(&pool, &key, &started).await?;
        Some(started)
    } else {
        None
    };

    println!("retrieve {}", org);
    println!("  repositories: {}", repos.len());
    println!("  commits written: {}", commits_written);
    if !incomplete.is_empty() {
        println!("  incomplete: {}", incomplete.join(", "));
    }
    match checkpoint {
        Some(ts) => println!("  checkpoint: {}", ts),
        None => println!("  checkpoint: unchanged"),
    }
    println!("ok");

    pool.close().await;
    Ok(())
}

fn since_to_timestamp(date: &str) -> Result<String> {
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .with_context(|| format!("Invalid --since date '{}': expected YYYY-MM-DD", date))?;
    Ok(format!("{}T00:00:00Z", day.format("%Y-%m-%d")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn since_date_becomes_midnight_utc() {
        assert_eq!(
            since_to_timestamp("2024-03-05").unwrap(),
            "2024-03-05T00:00:00Z"
        );
        assert!(since_to_timestamp("05/03/2024").is_err());
    }

    #[test]
    fn checkpoint_is_keyed_by_org() {
        assert_eq!(checkpoint_key("acme"), "github:acme");
    }
}
