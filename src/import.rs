//! Load a commit dump file into the record store.
//!
//! Each repository in the dump replaces whatever the store held for it;
//! repository positions follow the dump's key order.

use anyhow::{Context, Result};
use std::path::Path;

use crate::commits;
use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::store::{self, WriteMode};

pub async fn run_import(config: &Config, path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read commit dump: {}", path.display()))?;
    let groups = commits::parse_dump(&content)
        .with_context(|| format!("Failed to parse commit dump: {}", path.display()))?;

    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;

    let mut commits_written = 0u64;
    for (position, group) in groups.iter().enumerate() {
        commits_written += store::upsert_group(&pool, position as i64, group, WriteMode::Replace)
            .await
            .with_context(|| format!("Failed to store commits of '{}'", group.name))?;
    }

    println!("import {}", path.display());
    println!("  repositories: {}", groups.len());
    println!("  commits written: {}", commits_written);
    println!("ok");

    pool.close().await;
    Ok(())
}
