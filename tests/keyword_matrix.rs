//! Keyword matching policies, enumerated as a table.
//!
//! Each row names one combination of the four matching flags and the
//! findings it must produce for the same message and keyword list.

use commit_scan::aggregate::{self, SortKey};
use commit_scan::commits::parse_groups;
use commit_scan::config::SearchConfig;
use commit_scan::matcher::{self, KeywordMatcher, MatchConfig};
use indexmap::IndexMap;
use pretty_assertions::assert_eq;

const MESSAGE: &str = "Blackcoin rally: blackcoin, coin and coins";
const KEYWORDS: [&str; 2] = ["coin", "blackcoin"];

struct Policy {
    name: &'static str,
    config: MatchConfig,
    expected: &'static [(&'static str, usize)],
    total: usize,
}

const fn policy(
    name: &'static str,
    case_sensitive: bool,
    whole_word: bool,
    suppress_contained: bool,
    count_once_per_keyword: bool,
    expected: &'static [(&'static str, usize)],
    total: usize,
) -> Policy {
    Policy {
        name,
        config: MatchConfig {
            case_sensitive,
            whole_word,
            suppress_contained,
            count_once_per_keyword,
        },
        expected,
        total,
    }
}

const POLICIES: &[Policy] = &[
    policy("default", false, false, true, true, &[("blackcoin", 1)], 1),
    policy("raw counts", false, false, true, false, &[("blackcoin", 2)], 2),
    policy("keep contained, raw", false, false, false, false, &[("coin", 4), ("blackcoin", 2)], 6),
    policy("keep contained, once", false, false, false, true, &[("coin", 1), ("blackcoin", 1)], 2),
    policy("whole word, keep contained", false, true, false, false, &[("coin", 1), ("blackcoin", 2)], 3),
    policy("whole word, suppressed", false, true, true, false, &[("blackcoin", 2)], 2),
    policy("case sensitive substring", true, false, false, false, &[("coin", 4), ("blackcoin", 1)], 5),
    policy("case sensitive whole word", true, true, false, false, &[("coin", 1), ("blackcoin", 1)], 2),
    policy("strictest", true, true, true, true, &[("blackcoin", 1)], 1),
];

fn counts(pairs: &[(&str, usize)]) -> IndexMap<String, usize> {
    pairs.iter().map(|(k, n)| (k.to_string(), *n)).collect()
}

#[test]
fn policy_table() {
    for policy in POLICIES {
        let analysis = matcher::analyze(MESSAGE, &KEYWORDS, policy.config)
            .unwrap()
            .unwrap_or_else(|| panic!("{}: expected a match", policy.name));

        assert_eq!(analysis.counts, counts(policy.expected), "{}", policy.name);
        assert_eq!(analysis.total_instances, policy.total, "{}", policy.name);
    }
}

#[test]
fn analysis_is_deterministic() {
    for policy in POLICIES {
        let matcher = KeywordMatcher::new(&KEYWORDS, policy.config).unwrap();
        assert_eq!(matcher.analyze(MESSAGE), matcher.analyze(MESSAGE), "{}", policy.name);
    }
}

#[test]
fn counting_once_makes_total_equal_unique() {
    for policy in POLICIES.iter().filter(|p| p.config.count_once_per_keyword) {
        let analysis = matcher::analyze(MESSAGE, &KEYWORDS, policy.config)
            .unwrap()
            .unwrap();
        assert_eq!(analysis.total_instances, analysis.unique_keywords(), "{}", policy.name);
    }
}

#[test]
fn containing_keyword_alone_suppresses_contained_one() {
    let analysis = matcher::analyze("to the blackcoin moon", &KEYWORDS, MatchConfig::default())
        .unwrap()
        .unwrap();
    assert!(analysis.counts.contains_key("blackcoin"));
    assert!(!analysis.counts.contains_key("coin"));
}

#[test]
fn substring_counts_do_not_overlap() {
    let config = MatchConfig {
        count_once_per_keyword: false,
        ..MatchConfig::default()
    };
    let analysis = matcher::analyze("aaaa", &["aa"], config).unwrap().unwrap();
    assert_eq!(analysis.counts["aa"], 2);
}

#[test]
fn whole_word_rejects_partial_matches() {
    let config = MatchConfig {
        whole_word: true,
        ..MatchConfig::default()
    };
    assert_eq!(matcher::analyze("blackcoinish", &["coin"], config).unwrap(), None);
}

#[test]
fn case_sensitivity() {
    let insensitive = MatchConfig::default();
    let sensitive = MatchConfig {
        case_sensitive: true,
        ..MatchConfig::default()
    };
    assert!(matcher::analyze("Currency is rising", &["currency"], insensitive)
        .unwrap()
        .is_some());
    assert!(matcher::analyze("Currency is rising", &["currency"], sensitive)
        .unwrap()
        .is_none());
}

#[test]
fn end_to_end_two_repositories() {
    let groups = parse_groups(
        r#"{"repoA": [{"id":"1","message":"add currency support"}],
            "repoB": [{"id":"2","message":"fix currencies bug, currency typo"}]}"#,
    )
    .unwrap();
    let search = SearchConfig {
        keywords: vec!["currency".to_string(), "currencies".to_string()],
        matching: MatchConfig {
            suppress_contained: true,
            count_once_per_keyword: false,
            ..MatchConfig::default()
        },
        ..SearchConfig::default()
    };

    let results = aggregate::aggregate(&groups, &search).unwrap();
    let summary: Vec<(&str, IndexMap<String, usize>, usize)> = results
        .iter()
        .map(|r| (r.group.as_str(), r.matched_keywords.clone(), r.total_instances))
        .collect();

    // "currency" is not a substring of "currencies", so neither is suppressed
    assert_eq!(
        summary,
        vec![
            ("repoB", counts(&[("currency", 1), ("currencies", 1)]), 2),
            ("repoA", counts(&[("currency", 1)]), 1),
        ]
    );
}

#[test]
fn equal_totals_keep_discovery_order() {
    let groups = parse_groups(
        r#"{"first": [{"id":"f1","message":"coin"}, {"id":"f2","message":"nothing"}],
            "second": [{"id":"s1","message":"coin"}, {"id":"s2","message":"coin blackcoin"}]}"#,
    )
    .unwrap();
    let search = SearchConfig {
        keywords: vec!["coin".to_string(), "blackcoin".to_string()],
        matching: MatchConfig {
            suppress_contained: false,
            ..MatchConfig::default()
        },
        sort_by: SortKey::TotalInstances,
        ..SearchConfig::default()
    };

    let ids: Vec<String> = aggregate::aggregate(&groups, &search)
        .unwrap()
        .into_iter()
        .map(|r| r.record_id)
        .collect();
    assert_eq!(ids, vec!["s2", "f1", "s1"]);
}
