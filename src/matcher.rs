//! Keyword occurrence analysis.
//!
//! Decides, for one commit message, which configured keywords are present
//! and how often. Analysis runs as three independent passes:
//!
//! ```text
//!  message ──▶ detect ──▶ suppress_contained ──▶ tally ──▶ KeywordAnalysis
//!              (raw)      (optional)             (once / raw counts)
//! ```
//!
//! 1. **Detect**: every keyword (in configuration order) is searched in a
//!    comparison copy of the message, case-folded unless matching is case
//!    sensitive. Substring mode counts non-overlapping occurrences from a
//!    left-to-right scan; whole-word mode counts occurrences bounded by
//!    Unicode word boundaries. Keywords with zero occurrences are dropped.
//! 2. **Suppress contained**: when enabled, a matched keyword that is a
//!    substring of a longer *matched* keyword is discarded. Unmatched
//!    keywords never take part.
//! 3. **Tally**: each survivor counts either once or by its raw occurrence
//!    count; the total is the sum of the final counts.
//!
//! The matcher holds no mutable state, so a single [`KeywordMatcher`] can be
//! shared across threads and reused for every commit of a run.
//!
//! # Example
//!
//! ```rust
//! use commit_scan::matcher::{KeywordMatcher, MatchConfig};
//!
//! let config = MatchConfig {
//!     suppress_contained: true,
//!     count_once_per_keyword: false,
//!     ..MatchConfig::default()
//! };
//! let matcher = KeywordMatcher::new(&["coin", "blackcoin"], config).unwrap();
//!
//! let analysis = matcher.analyze("Bump BlackCoin to 1.2").unwrap();
//! assert_eq!(analysis.counts.get("blackcoin"), Some(&1));
//! assert!(!analysis.counts.contains_key("coin"));
//! assert!(matcher.analyze("update readme").is_none());
//! ```

use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use std::borrow::Cow;
use std::collections::HashSet;

/// Matching policy for one run.
///
/// Deserialized from the `[search]` table of the configuration file; every
/// flag is optional there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Compare keywords and messages without case folding.
    pub case_sensitive: bool,
    /// Only count occurrences bounded by non-word characters or string edges.
    pub whole_word: bool,
    /// Discard a matched keyword contained in a longer matched keyword.
    pub suppress_contained: bool,
    /// Count every matched keyword once, however often it occurs.
    pub count_once_per_keyword: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            whole_word: false,
            suppress_contained: true,
            count_once_per_keyword: true,
        }
    }
}

/// Per-commit analysis output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordAnalysis {
    /// Surviving keyword (as configured) to its final count, in keyword order.
    pub counts: IndexMap<String, usize>,
    /// Sum of the final per-keyword counts.
    pub total_instances: usize,
}

impl KeywordAnalysis {
    pub fn unique_keywords(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// A keyword found by the detection pass, with its raw occurrence count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate<'k> {
    /// Keyword as configured; used as the output key.
    pub label: &'k str,
    /// Keyword as compared (case-folded unless case sensitive).
    pub needle: &'k str,
    pub occurrences: usize,
}

#[derive(Debug, Clone)]
struct Keyword {
    label: String,
    needle: String,
    bounded: Option<Regex>,
}

/// Keyword list compiled against one [`MatchConfig`].
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    keywords: Vec<Keyword>,
    config: MatchConfig,
}

/// Whole-word pattern for `needle`: `\b` only at edges that are word characters.
fn word_pattern(needle: &str) -> String {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let lead = if needle.chars().next().is_some_and(is_word) { r"\b" } else { "" };
    let trail = if needle.chars().next_back().is_some_and(is_word) { r"\b" } else { "" };
    format!("{}{}{}", lead, regex::escape(needle), trail)
}

impl KeywordMatcher {
    /// Compile `keywords` for `config`.
    ///
    /// Keywords whose comparison form repeats an earlier one are dropped, so
    /// `"Coin"` and `"coin"` collapse to the first spelling when matching is
    /// case-insensitive. Keyword content is not validated: an empty keyword
    /// matches at every position.
    ///
    /// With `whole_word`, a word boundary is required only at an edge of the
    /// keyword that is itself a word character, so `c++` matches in
    /// `use c++ now` but not in `abc++`.
    ///
    /// # Errors
    ///
    /// Fails only if a whole-word pattern exceeds the regex size limit.
    pub fn new<S: AsRef<str>>(keywords: &[S], config: MatchConfig) -> Result<Self, regex::Error> {
        let mut seen = HashSet::new();
        let mut compiled = Vec::with_capacity(keywords.len());

        for keyword in keywords {
            let label = keyword.as_ref();
            let needle = fold(label, config.case_sensitive).into_owned();
            if !seen.insert(needle.clone()) {
                continue;
            }

            let bounded = if config.whole_word {
                Some(Regex::new(&word_pattern(&needle))?)
            } else {
                None
            };

            compiled.push(Keyword {
                label: label.to_string(),
                needle,
                bounded,
            });
        }

        Ok(Self {
            keywords: compiled,
            config,
        })
    }

    pub fn config(&self) -> MatchConfig {
        self.config
    }

    /// Number of distinct keywords after collapsing duplicates.
    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// Analyze one message. Returns `None` when no keyword survives.
    pub fn analyze(&self, text: &str) -> Option<KeywordAnalysis> {
        let haystack = fold(text, self.config.case_sensitive);
        let mut candidates = self.detect(&haystack);
        if self.config.suppress_contained {
            candidates = suppress_contained(candidates);
        }
        let analysis = tally(candidates, self.config.count_once_per_keyword);
        (!analysis.is_empty()).then_some(analysis)
    }

    /// Detection pass over an already-folded haystack.
    pub fn detect(&self, haystack: &str) -> Vec<Candidate<'_>> {
        self.keywords
            .iter()
            .filter_map(|keyword| {
                let occurrences = match &keyword.bounded {
                    Some(pattern) => pattern.find_iter(haystack).count(),
                    None => haystack.matches(keyword.needle.as_str()).count(),
                };
                (occurrences > 0).then_some(Candidate {
                    label: &keyword.label,
                    needle: &keyword.needle,
                    occurrences,
                })
            })
            .collect()
    }
}

/// Drop every candidate whose needle is contained in a longer candidate's.
///
/// Candidates are compared longest first; the survivors keep their original
/// order.
pub fn suppress_contained(candidates: Vec<Candidate<'_>>) -> Vec<Candidate<'_>> {
    let mut by_length: Vec<&str> = candidates.iter().map(|c| c.needle).collect();
    by_length.sort_by(|a, b| b.len().cmp(&a.len()));

    let mut contained: HashSet<&str> = HashSet::new();
    for (i, &longer) in by_length.iter().enumerate() {
        for &shorter in &by_length[i + 1..] {
            if longer.contains(shorter) {
                contained.insert(shorter);
            }
        }
    }

    candidates
        .into_iter()
        .filter(|c| !contained.contains(c.needle))
        .collect()
}

/// Counting pass.
pub fn tally(candidates: Vec<Candidate<'_>>, count_once_per_keyword: bool) -> KeywordAnalysis {
    let counts: IndexMap<String, usize> = candidates
        .into_iter()
        .map(|c| {
            let count = if count_once_per_keyword { 1 } else { c.occurrences };
            (c.label.to_string(), count)
        })
        .collect();
    let total_instances = counts.values().sum();

    KeywordAnalysis {
        counts,
        total_instances,
    }
}

/// One-shot analysis without reusing a compiled matcher.
pub fn analyze<S: AsRef<str>>(
    text: &str,
    keywords: &[S],
    config: MatchConfig,
) -> Result<Option<KeywordAnalysis>, regex::Error> {
    Ok(KeywordMatcher::new(keywords, config)?.analyze(text))
}

fn fold(text: &str, case_sensitive: bool) -> Cow<'_, str> {
    if case_sensitive {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(text.to_lowercase())
    }
}
