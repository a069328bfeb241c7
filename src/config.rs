//! TOML configuration parsing and validation.
//!
//! The whole run is driven by a single immutable [`Config`] loaded once by
//! [`load_config`] and passed by reference to every command.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::aggregate::SortKey;
use crate::matcher::MatchConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub retrieve: RetrieveConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FilesConfig {
    pub dir: PathBuf,
    pub commits_file: String,
    pub analysis_file: String,
    pub findings_file: String,
    pub report_file: String,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./generated_files"),
            commits_file: "organization_commits.json".to_string(),
            analysis_file: "commit_analysis.txt".to_string(),
            findings_file: "keyword_search_results.json".to_string(),
            report_file: "project_analysis.xlsx".to_string(),
        }
    }
}

impl FilesConfig {
    pub fn commits_path(&self) -> PathBuf {
        self.dir.join(&self.commits_file)
    }

    pub fn analysis_path(&self) -> PathBuf {
        self.dir.join(&self.analysis_file)
    }

    pub fn findings_path(&self) -> PathBuf {
        self.dir.join(&self.findings_file)
    }

    pub fn report_path(&self) -> PathBuf {
        self.dir.join(&self.report_file)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrieveConfig {
    #[serde(default)]
    pub org: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RetrieveConfig {
    fn default() -> Self {
        Self {
            org: String::new(),
            api_base: default_api_base(),
            token_env: default_token_env(),
            per_page: default_per_page(),
            page_delay_ms: default_page_delay_ms(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}
fn default_per_page() -> u32 {
    100
}
fn default_page_delay_ms() -> u64 {
    1000
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl RetrieveConfig {
    /// Token from the configured environment variable, if set and non-empty.
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
    }
}

/// Keyword search settings: keyword list, exclusions, matching policy,
/// metadata inclusion, and ranking key.
#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub exclude_repos: HashSet<String>,
    #[serde(default = "default_true")]
    pub include_committer: bool,
    #[serde(default = "default_true")]
    pub include_author: bool,
    #[serde(flatten)]
    pub matching: MatchConfig,
    #[serde(default)]
    pub sort_by: SortKey,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            exclude_repos: HashSet::new(),
            include_committer: true,
            include_author: true,
            matching: MatchConfig::default(),
            sort_by: SortKey::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Stages executed by `cscan run`.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    pub retrieve: bool,
    pub summary: bool,
    pub search: bool,
    pub report: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retrieve: false,
            summary: true,
            search: true,
            report: true,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate retrieval
    if !(1..=100).contains(&config.retrieve.per_page) {
        bail!("retrieve.per_page must be between 1 and 100");
    }
    if config.retrieve.api_base.trim().is_empty() {
        bail!("retrieve.api_base must not be empty");
    }

    // Validate pipeline stages against their inputs
    if config.pipeline.retrieve && config.retrieve.org.trim().is_empty() {
        bail!("retrieve.org must be set when pipeline.retrieve is enabled");
    }
    if config.pipeline.search && config.search.keywords.is_empty() {
        bail!("search.keywords must not be empty when pipeline.search is enabled");
    }

    // The findings file stores the sum under "total" next to the keyword counts
    if let Some(keyword) = config.search.keywords.iter().find(|k| k.as_str() == "total") {
        bail!(
            "search.keywords must not contain '{}': that name is reserved for the instance total in the findings file",
            keyword
        );
    }

    Ok(config)
}
