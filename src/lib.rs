//! # Commit Scan
//!
//! Retrieves an organisation's commit history from a code forge and ranks
//! commits by how many configured keywords their messages contain.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │ Forge API   │──▶│  Retrieve   │──▶│    SQLite    │
//! │ (GitHub)    │   │  paginated  │   │ record store │
//! └─────────────┘   └─────────────┘   └──────┬───────┘
//!                                            │  RecordSource
//!                 ┌──────────────────────────┼─────────────────┐
//!                 ▼                          ▼                 ▼
//!           ┌──────────┐             ┌──────────────┐    ┌──────────┐
//!           │ summary  │             │ matcher +    │───▶│  report  │
//!           │          │             │ aggregate    │    │  (.xlsx) │
//!           └──────────┘             └──────────────┘    └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cscan init                         # create the record store
//! cscan retrieve                     # fetch the organisation's commits
//! cscan import commits.json          # ...or load an existing dump
//! cscan search --sort-by unique_keywords
//! cscan report                       # write the spreadsheet
//! cscan run                          # every stage enabled in [pipeline]
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Core data types |
//! | [`matcher`] | Keyword detection, containment suppression, counting |
//! | [`aggregate`] | Per-record analysis, exclusion and ranking |
//! | [`commits`] | Commit dump parsing |
//! | [`traits`] | The `RecordSource` extension trait |
//! | [`github`] | Forge API client |
//! | [`retrieve`] | Organisation retrieval into the store |
//! | [`store`] | SQLite record store |
//! | [`summary`] | Per-repository commit summary |
//! | [`findings`] | Findings file |
//! | [`report`] | Spreadsheet report |
//! | [`pipeline`] | `cscan run` |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod aggregate;
pub mod commits;
pub mod config;
pub mod db;
pub mod export;
pub mod findings;
pub mod github;
pub mod import;
pub mod matcher;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod retrieve;
pub mod search;
pub mod sources;
pub mod store;
pub mod summary;
pub mod traits;
