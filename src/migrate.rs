use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every table and index. Safe to run repeatedly.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // Repositories in forge listing order
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS repositories (
            name TEXT PRIMARY KEY,
            position INTEGER NOT NULL,
            retrieved_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Commits, normalized columns plus the verbatim forge JSON
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS commits (
            repo TEXT NOT NULL,
            sha TEXT NOT NULL,
            position INTEGER NOT NULL,
            message TEXT NOT NULL DEFAULT '',
            committer_name TEXT,
            committer_email TEXT,
            author_name TEXT,
            author_email TEXT,
            committed_at TEXT,
            raw_json TEXT NOT NULL DEFAULT '{}',
            PRIMARY KEY (repo, sha),
            FOREIGN KEY (repo) REFERENCES repositories(name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Incremental retrieval cursors
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS checkpoints (
            source TEXT PRIMARY KEY,
            cursor TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_commits_repo_position ON commits(repo, position)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_repositories_position ON repositories(position)")
        .execute(pool)
        .await?;

    Ok(())
}
