//! SQLite record store for retrieved commits.
//!
//! Repositories keep the position the forge listed them in and commits keep
//! their listing position within the repository, so loading the store
//! reproduces the discovery order the ranking tie-break depends on.

use anyhow::{Context, Result};
use async_trait::async_trait;
use indexmap::IndexMap;
use sqlx::{Row, SqlitePool};

use crate::commits::DumpGroup;
use crate::config::Config;
use crate::db;
use crate::models::{Person, RecordGroup, TextRecord};
use crate::traits::RecordSource;

/// How a repository's commits are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Drop the repository's stored commits first.
    Replace,
    /// Prepend newer commits ahead of the stored ones.
    Merge,
}

/// Write one repository and its commits in a single transaction.
///
/// Returns the number of commits written.
pub async fn upsert_group(
    pool: &SqlitePool,
    position: i64,
    group: &DumpGroup,
    mode: WriteMode,
) -> Result<u64> {
    let now = chrono::Utc::now().timestamp();
    let records = group.records();
    let raw_commits: Vec<&serde_json::Value> =
        group.commits.iter().filter(|c| !c.is_null()).collect();

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO repositories (name, position, retrieved_at) VALUES (?, ?, ?)
        ON CONFLICT(name) DO UPDATE SET position = excluded.position, retrieved_at = excluded.retrieved_at
        "#,
    )
    .bind(&group.name)
    .bind(position)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    match mode {
        WriteMode::Replace => {
            sqlx::query("DELETE FROM commits WHERE repo = ?")
                .bind(&group.name)
                .execute(&mut *tx)
                .await?;
        }
        WriteMode::Merge => {
            sqlx::query("UPDATE commits SET position = position + ? WHERE repo = ?")
                .bind(records.len() as i64)
                .bind(&group.name)
                .execute(&mut *tx)
                .await?;
        }
    }

    let mut written = 0u64;
    for (index, (record, raw)) in records.iter().zip(raw_commits).enumerate() {
        let committer = record.committer.clone().unwrap_or_default();
        let author = record.author.clone().unwrap_or_default();

        sqlx::query(
            r#"
            INSERT INTO commits (repo, sha, position, message, committer_name, committer_email,
                                 author_name, author_email, committed_at, raw_json)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(repo, sha) DO UPDATE SET
                position = excluded.position,
                message = excluded.message,
                committer_name = excluded.committer_name,
                committer_email = excluded.committer_email,
                author_name = excluded.author_name,
                author_email = excluded.author_email,
                committed_at = excluded.committed_at,
                raw_json = excluded.raw_json
            "#,
        )
        .bind(&group.name)
        .bind(&record.id)
        .bind(index as i64)
        .bind(&record.message)
        .bind(&committer.name)
        .bind(&committer.email)
        .bind(&author.name)
        .bind(&author.email)
        .bind(&record.timestamp)
        .bind(raw.to_string())
        .execute(&mut *tx)
        .await?;

        written += 1;
    }

    tx.commit().await?;
    Ok(written)
}

/// Load every repository with its commits, in discovery order.
pub async fn load_groups(pool: &SqlitePool) -> Result<Vec<RecordGroup>> {
    let mut groups = empty_groups(pool).await?;

    let rows = sqlx::query(
        r#"
        SELECT repo, sha, message, committer_name, committer_email,
               author_name, author_email, committed_at
        FROM commits
        ORDER BY repo, position
        "#,
    )
    .fetch_all(pool)
    .await?;

    for row in &rows {
        let repo: String = row.get("repo");
        let record = TextRecord {
            id: row.get("sha"),
            group: repo.clone(),
            message: row.get("message"),
            committer: person(row.get("committer_name"), row.get("committer_email")),
            author: person(row.get("author_name"), row.get("author_email")),
            timestamp: row.get("committed_at"),
        };
        groups
            .entry(repo.clone())
            .or_insert_with(|| RecordGroup::new(repo, Vec::new()))
            .records
            .push(record);
    }

    Ok(groups.into_values().collect())
}

/// Load the store back into dump form, commits as originally retrieved.
pub async fn load_dump(pool: &SqlitePool) -> Result<Vec<DumpGroup>> {
    let mut groups: IndexMap<String, DumpGroup> = empty_groups(pool)
        .await?
        .into_keys()
        .map(|name| {
            let group = DumpGroup {
                name: name.clone(),
                commits: Vec::new(),
            };
            (name, group)
        })
        .collect();

    let rows = sqlx::query("SELECT repo, sha, raw_json FROM commits ORDER BY repo, position")
        .fetch_all(pool)
        .await?;

    for row in &rows {
        let repo: String = row.get("repo");
        let sha: String = row.get("sha");
        let raw: String = row.get("raw_json");
        let value: serde_json::Value = serde_json::from_str(&raw)
            .with_context(|| format!("Corrupt stored commit {} in {}", sha, repo))?;
        groups
            .entry(repo.clone())
            .or_insert_with(|| DumpGroup {
                name: repo,
                commits: Vec::new(),
            })
            .commits
            .push(value);
    }

    Ok(groups.into_values().collect())
}

async fn empty_groups(pool: &SqlitePool) -> Result<IndexMap<String, RecordGroup>> {
    let names: Vec<String> =
        sqlx::query_scalar("SELECT name FROM repositories ORDER BY position, name")
            .fetch_all(pool)
            .await?;

    Ok(names
        .into_iter()
        .map(|name| (name.clone(), RecordGroup::new(name, Vec::new())))
        .collect())
}

fn person(name: Option<String>, email: Option<String>) -> Option<Person> {
    if name.is_none() && email.is_none() {
        None
    } else {
        Some(Person { name, email })
    }
}

pub async fn commit_count(pool: &SqlitePool) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM commits")
        .fetch_one(pool)
        .await?)
}

pub async fn get_checkpoint(pool: &SqlitePool, source: &str) -> Result<Option<String>> {
    Ok(
        sqlx::query_scalar("SELECT cursor FROM checkpoints WHERE source = ?")
            .bind(source)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn set_checkpoint(pool: &SqlitePool, source: &str, cursor_val: &str) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO checkpoints (source, cursor, updated_at) VALUES (?, ?, ?)
        ON CONFLICT(source) DO UPDATE SET cursor = excluded.cursor, updated_at = excluded.updated_at
        "#,
    )
    .bind(source)
    .bind(cursor_val)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

/// Record source backed by the configured SQLite store.
pub struct SqliteSource {
    config: Config,
}

impl SqliteSource {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

#[async_trait]
impl RecordSource for SqliteSource {
    fn name(&self) -> &str {
        "store"
    }

    async fn load_groups(&self) -> Result<Vec<RecordGroup>> {
        let pool = db::connect(&self.config).await?;
        let groups = load_groups(&pool).await;
        pool.close().await;
        groups.context("Failed to load commits from the record store. Run `cscan init` first?")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate::apply(&pool).await.unwrap();
        pool
    }

    fn dump(name: &str, shas: &[&str]) -> DumpGroup {
        DumpGroup {
            name: name.to_string(),
            commits: shas
                .iter()
                .map(|sha| json!({"sha": sha, "commit": {"message": format!("msg {}", sha)}}))
                .collect(),
        }
    }

    #[tokio::test]
    async fn groups_load_in_discovery_order() {
        let pool = memory_pool().await;
        upsert_group(&pool, 0, &dump("zeta", &["z2", "z1"]), WriteMode::Replace)
            .await
            .unwrap();
        upsert_group(&pool, 1, &dump("alpha", &["a1"]), WriteMode::Replace)
            .await
            .unwrap();
        upsert_group(&pool, 2, &dump("empty", &[]), WriteMode::Replace)
            .await
            .unwrap();

        let groups = load_groups(&pool).await.unwrap();
        let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "empty"]);
        let shas: Vec<&str> = groups[0].records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(shas, vec!["z2", "z1"]);
        assert_eq!(groups[0].records[0].message, "msg z2");
        assert_eq!(commit_count(&pool).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn merge_prepends_newer_commits() {
        let pool = memory_pool().await;
        upsert_group(&pool, 0, &dump("core", &["c2", "c1"]), WriteMode::Replace)
            .await
            .unwrap();
        upsert_group(&pool, 0, &dump("core", &["c4", "c3"]), WriteMode::Merge)
            .await
            .unwrap();

        let groups = load_groups(&pool).await.unwrap();
        let shas: Vec<&str> = groups[0].records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(shas, vec!["c4", "c3", "c2", "c1"]);
    }

    #[tokio::test]
    async fn replace_drops_previous_commits() {
        let pool = memory_pool().await;
        upsert_group(&pool, 0, &dump("core", &["c1", "c2"]), WriteMode::Replace)
            .await
            .unwrap();
        upsert_group(&pool, 0, &dump("core", &["c3"]), WriteMode::Replace)
            .await
            .unwrap();
        assert_eq!(commit_count(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn dump_round_trips_raw_commits() {
        let pool = memory_pool().await;
        let group = dump("core", &["c1"]);
        upsert_group(&pool, 0, &group, WriteMode::Replace)
            .await
            .unwrap();
        let loaded = load_dump(&pool).await.unwrap();
        assert_eq!(loaded, vec![group]);
    }

    #[tokio::test]
    async fn checkpoint_upserts() {
        let pool = memory_pool().await;
        assert!(get_checkpoint(&pool, "org").await.unwrap().is_none());
        set_checkpoint(&pool, "org", "2024-01-01T00:00:00Z").await.unwrap();
        set_checkpoint(&pool, "org", "2024-02-01T00:00:00Z").await.unwrap();
        assert_eq!(
            get_checkpoint(&pool, "org").await.unwrap().as_deref(),
            Some("2024-02-01T00:00:00Z")
        );
    }
}
