//! `cscan run`: the configured stages, in order.
//!
//! retrieve → summary → search → report, each one enabled by its flag in
//! `[pipeline]`. Every stage after retrieval reads the record store.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::progress::RetrieveProgressReporter;
use crate::report::{self, ReportOptions};
use crate::retrieve::{self, RetrieveOptions};
use crate::search::{self, SearchOptions};
use crate::store::{self, SqliteSource};
use crate::summary;

pub async fn run_pipeline(config: &Config, progress: &dyn RetrieveProgressReporter) -> Result<()> {
    let stages = &config.pipeline;
    if !(stages.retrieve || stages.summary || stages.search || stages.report) {
        bail!("Every [pipeline] stage is disabled; nothing to run.");
    }

    if stages.retrieve {
        retrieve::run_retrieve(config, &RetrieveOptions::default(), progress).await?;
    }

    if !(stages.summary || stages.search || stages.report) {
        return Ok(());
    }

    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    let commits = store::commit_count(&pool).await?;
    pool.close().await;

    if commits == 0 {
        bail!(
            "The record store at {} holds no commits. Run `cscan retrieve` or `cscan import` first.",
            config.db.path.display()
        );
    }
    tracing::info!(commits, "record store ready");

    let source = SqliteSource::new(config);

    if stages.summary {
        summary::run_summary(config, &source, None).await?;
    }
    if stages.search {
        search::run_search(config, &source, &SearchOptions::default()).await?;
    }
    if stages.report {
        report::run_report(config, &source, &ReportOptions::default()).await?;
    }

    Ok(())
}
