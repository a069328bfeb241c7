//! Export the record store as a commit dump.
//!
//! Produces the same JSON shape `cscan import` and `--input` read: an
//! object keyed by repository name, commits as originally retrieved.

use anyhow::{Context, Result};
use std::path::Path;

use crate::commits;
use crate::config::Config;
use crate::db;
use crate::store;

/// Export the store as a commit dump.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes
/// to stdout for piping.
pub async fn run_export(config: &Config, output: Option<&Path>) -> Result<()> {
    let pool = db::connect(config).await?;
    let groups = store::load_dump(&pool).await;
    pool.close().await;
    let groups = groups.context("Failed to read the record store. Run `cscan init` first?")?;

    let repo_count = groups.len();
    let commit_count: usize = groups.iter().map(|g| g.commits.len()).sum();
    let json = commits::dump_to_json(&groups)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!(
                "Exported {} repositories, {} commits to {}",
                repo_count,
                commit_count,
                path.display()
            );
        }
        None => {
            println!("{}", json);
        }
    }

    Ok(())
}
