//! # Commit Scan CLI (`cscan`)
//!
//! Retrieves an organisation's commits from a code forge, stores them in a
//! local SQLite record store, and ranks them by keyword findings.
//!
//! ## Usage
//!
//! ```bash
//! cscan --config ./config/cscan.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cscan init` | Create the record store and run schema migrations |
//! | `cscan sources` | Show the store, dump file and forge status |
//! | `cscan retrieve` | Fetch the organisation's commits into the store |
//! | `cscan import <file>` | Load a commit dump into the store |
//! | `cscan export` | Write the store as a commit dump |
//! | `cscan summary` | Per-repository commit and contributor counts |
//! | `cscan search` | Rank commits by keyword findings |
//! | `cscan report` | Write the spreadsheet report |
//! | `cscan run` | Every stage enabled in `[pipeline]` |
//!
//! ## Examples
//!
//! ```bash
//! # Incremental retrieval with JSON progress on stderr
//! cscan retrieve --progress json
//!
//! # Search a dump without touching the store
//! cscan search --input ./organization_commits.json --sort-by unique_keywords
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use commit_scan::aggregate::SortKey;
use commit_scan::progress::ProgressMode;
use commit_scan::report::ReportOptions;
use commit_scan::retrieve::RetrieveOptions;
use commit_scan::search::SearchOptions;
use commit_scan::{
    config, export, import, migrate, pipeline, report, retrieve, search, sources, summary,
};

/// Commit Scan CLI: retrieve an organisation's commits and rank them by
/// keyword findings.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/cscan.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "cscan",
    about = "Commit Scan: rank an organisation's commits by keyword findings",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cscan.toml")]
    config: PathBuf,

    /// Log filter used when `RUST_LOG` is unset (e.g. `info`, `commit_scan=debug`).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the record store schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Show where commits can be read from and whether each place is usable.
    Sources,

    /// Fetch the organisation's commits into the record store.
    ///
    /// Incremental by default: only commits newer than the last successful
    /// run are fetched and merged ahead of the stored ones.
    Retrieve {
        /// Ignore the checkpoint and refetch every commit.
        #[arg(long)]
        full: bool,

        /// Only commits on or after this date (YYYY-MM-DD).
        #[arg(long)]
        since: Option<String>,

        /// Only this repository (repeatable).
        #[arg(long = "repo")]
        repos: Vec<String>,

        /// List repositories without fetching commits or writing.
        #[arg(long)]
        dry_run: bool,

        /// Progress on stderr: `off`, `human` or `json` (default: human on a TTY).
        #[arg(long)]
        progress: Option<ProgressMode>,
    },

    /// Load a commit dump (JSON keyed by repository) into the record store.
    Import {
        /// Dump file.
        file: PathBuf,
    },

    /// Write the record store as a commit dump.
    Export {
        /// Output file (default: stdout).
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Per-repository commit and contributor counts.
    Summary {
        /// Read this dump file instead of the record store.
        #[arg(long)]
        input: Option<PathBuf>,

        /// Analysis file to write (default: `files.analysis_file`).
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Rank commits by keyword findings and write the findings file.
    Search {
        /// Read this dump file instead of the record store.
        #[arg(long)]
        input: Option<PathBuf>,

        /// Findings file to write (default: `files.findings_file`).
        #[arg(long)]
        output: Option<PathBuf>,

        /// Ranking key: `total_instances` or `unique_keywords`.
        #[arg(long)]
        sort_by: Option<SortKey>,

        /// Maximum number of results to print.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Write the spreadsheet report from the commits and the findings file.
    Report {
        /// Read this dump file instead of the record store.
        #[arg(long)]
        input: Option<PathBuf>,

        /// Findings file to read (default: `files.findings_file`).
        #[arg(long)]
        findings: Option<PathBuf>,

        /// Workbook to write (default: `files.report_file`).
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Run every stage enabled in `[pipeline]`.
    Run {
        /// Progress on stderr for the retrieve stage.
        #[arg(long)]
        progress: Option<ProgressMode>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Record store initialized successfully.");
        }
        Commands::Sources => {
            sources::list_sources(&cfg).await?;
        }
        Commands::Retrieve {
            full,
            since,
            repos,
            dry_run,
            progress,
        } => {
            let reporter = progress
                .unwrap_or_else(ProgressMode::default_for_tty)
                .reporter();
            let options = RetrieveOptions {
                full,
                since,
                repos,
                dry_run,
            };
            retrieve::run_retrieve(&cfg, &options, reporter.as_ref()).await?;
        }
        Commands::Import { file } => {
            import::run_import(&cfg, &file).await?;
        }
        Commands::Export { output } => {
            export::run_export(&cfg, output.as_deref()).await?;
        }
        Commands::Summary { input, output } => {
            let source = sources::resolve_source(&cfg, input.as_deref());
            summary::run_summary(&cfg, source.as_ref(), output.as_deref()).await?;
        }
        Commands::Search {
            input,
            output,
            sort_by,
            limit,
        } => {
            let source = sources::resolve_source(&cfg, input.as_deref());
            let options = SearchOptions {
                output,
                sort_by,
                limit,
            };
            search::run_search(&cfg, source.as_ref(), &options).await?;
        }
        Commands::Report {
            input,
            findings,
            output,
        } => {
            let source = sources::resolve_source(&cfg, input.as_deref());
            let options = ReportOptions { findings, output };
            report::run_report(&cfg, source.as_ref(), &options).await?;
        }
        Commands::Run { progress } => {
            let reporter = progress
                .unwrap_or_else(ProgressMode::default_for_tty)
                .reporter();
            pipeline::run_pipeline(&cfg, reporter.as_ref()).await?;
        }
    }

    Ok(())
}
