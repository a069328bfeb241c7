//! Record source selection and status.

use anyhow::Result;
use std::path::Path;

use crate::commits::JsonFileSource;
use crate::config::Config;
use crate::db;
use crate::store::{self, SqliteSource};
use crate::traits::RecordSource;

/// The source analysis commands read from: a dump file when `input` is
/// given, otherwise the record store.
pub fn resolve_source(config: &Config, input: Option<&Path>) -> Box<dyn RecordSource> {
    match input {
        Some(path) => Box::new(JsonFileSource::new(path)),
        None => Box::new(SqliteSource::new(config)),
    }
}

/// Print where commits can come from and whether each place is usable.
pub async fn list_sources(config: &Config) -> Result<()> {
    println!("{:<12} {:<28} DETAIL", "SOURCE", "STATUS");

    let store_status = if config.db.path.exists() {
        let pool = db::connect(config).await?;
        let counted = store::commit_count(&pool).await;
        pool.close().await;
        match counted {
            Ok(n) => (format!("OK ({} commits)", n), config.db.path.display().to_string()),
            Err(_) => (
                "NOT INITIALIZED".to_string(),
                "run `cscan init`".to_string(),
            ),
        }
    } else {
        (
            "MISSING".to_string(),
            format!("{} (run `cscan init`)", config.db.path.display()),
        )
    };
    println!("{:<12} {:<28} {}", "store", store_status.0, store_status.1);

    let dump = config.files.commits_path();
    let dump_status = if dump.exists() { "OK" } else { "MISSING" };
    println!("{:<12} {:<28} {}", "dump", dump_status, dump.display());

    let forge_status = if config.retrieve.org.trim().is_empty() {
        "NOT CONFIGURED".to_string()
    } else if config.retrieve.token().is_some() {
        format!("OK (org {})", config.retrieve.org)
    } else {
        format!("NO TOKEN (org {})", config.retrieve.org)
    };
    println!(
        "{:<12} {:<28} {}",
        "forge", forge_status, config.retrieve.api_base
    );

    Ok(())
}
