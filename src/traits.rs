//! Extension trait for commit record sources.
//!
//! Every analysis command consumes commits through [`RecordSource`], so the
//! keyword engine never knows whether the data came from the SQLite record
//! store, a JSON dump on disk, or an in-memory fixture.
//!
//! ```text
//! ┌─────────────┐ ┌──────────────┐ ┌────────────┐
//! │ SqliteSource│ │JsonFileSource│ │  Custom    │
//! └──────┬──────┘ └──────┬───────┘ └─────┬──────┘
//!        └───────────────┼───────────────┘
//!                        ▼
//!        summary / search / report commands
//! ```

use anyhow::Result;
use async_trait::async_trait;

use crate::models::RecordGroup;

/// A provider of commits grouped by repository.
///
/// # Example
///
/// ```rust
/// use anyhow::Result;
/// use async_trait::async_trait;
/// use commit_scan::models::{RecordGroup, TextRecord};
/// use commit_scan::traits::RecordSource;
///
/// pub struct Fixture;
///
/// #[async_trait]
/// impl RecordSource for Fixture {
///     fn name(&self) -> &str { "fixture" }
///
///     async fn load_groups(&self) -> Result<Vec<RecordGroup>> {
///         Ok(vec![RecordGroup::new(
///             "core",
///             vec![TextRecord::new("1", "core", "add coin support")],
///         )])
///     }
/// }
/// ```
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Short label used in command output (e.g. `"store"`, a file path).
    fn name(&self) -> &str;

    /// Load every repository with its commits.
    ///
    /// Repositories come back in source order and commits in the order the
    /// forge listed them; ranking ties depend on this order.
    async fn load_groups(&self) -> Result<Vec<RecordGroup>>;
}

/// An in-memory source, handy for tests and embedding.
pub struct StaticSource {
    groups: Vec<RecordGroup>,
}

impl StaticSource {
    pub fn new(groups: Vec<RecordGroup>) -> Self {
        Self { groups }
    }
}

#[async_trait]
impl RecordSource for StaticSource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load_groups(&self) -> Result<Vec<RecordGroup>> {
        Ok(self.groups.clone())
    }
}
