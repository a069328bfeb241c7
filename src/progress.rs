//! Retrieval progress reporting.
//!
//! Reports what `cscan retrieve` is doing while it walks an organisation:
//! which repository is being fetched, how many are left, and how many
//! commits each produced. Progress is emitted on **stderr** so stdout
//! remains parseable for scripts.

use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

/// A single progress event for retrieval.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum RetrieveProgressEvent {
    /// Listing the organisation's repositories (total unknown).
    Discovering { org: String },
    /// Fetching commits of repository `n` out of `total`.
    Fetching { repo: String, n: u64, total: u64 },
    /// A repository finished with `commits` commits written.
    Fetched { repo: String, commits: u64 },
}

impl fmt::Display for RetrieveProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discovering { org } => write!(f, "retrieve {}  listing repositories...", org),
            Self::Fetching { repo, n, total } => write!(
                f,
                "retrieve {}  fetching  {} / {} repos",
                repo,
                grouped(*n),
                grouped(*total)
            ),
            Self::Fetched { repo, commits } => {
                write!(f, "retrieve {}  {} commits", repo, grouped(*commits))
            }
        }
    }
}

/// Receives retrieval progress events.
pub trait RetrieveProgressReporter: Send + Sync {
    fn report(&self, event: RetrieveProgressEvent);
}

/// One human-readable line per event on stderr.
pub struct StderrProgress;

impl RetrieveProgressReporter for StderrProgress {
    fn report(&self, event: RetrieveProgressEvent) {
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{}", event);
    }
}

/// JSON lines on stderr, e.g. `{"event":"progress","phase":"fetched","repo":"core","commits":12}`.
pub struct JsonProgress;

#[derive(Serialize)]
struct JsonLine<'a> {
    event: &'static str,
    #[serde(flatten)]
    inner: &'a RetrieveProgressEvent,
}

impl RetrieveProgressReporter for JsonProgress {
    fn report(&self, event: RetrieveProgressEvent) {
        let line = JsonLine {
            event: "progress",
            inner: &event,
        };
        if let Ok(text) = serde_json::to_string(&line) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", text);
        }
    }
}

/// Discards every event.
pub struct NoProgress;

impl RetrieveProgressReporter for NoProgress {
    fn report(&self, _event: RetrieveProgressEvent) {}
}

/// `1234567` -> `1,234,567`.
fn grouped(n: u64) -> String {
    let digits = n.to_string();
    let head = digits.len() % 3;
    let mut out = String::from(&digits[..head]);
    for (i, chunk) in digits.as_bytes()[head..].chunks(3).enumerate() {
        if head > 0 || i > 0 {
            out.push(',');
        }
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
    }
    out
}

/// Where `--progress` sends retrieval progress.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human output when stderr is a terminal, nothing otherwise.
    pub fn default_for_tty() -> Self {
        match atty::is(atty::Stream::Stderr) {
            true => Self::Human,
            false => Self::Off,
        }
    }

    pub fn reporter(&self) -> Box<dyn RetrieveProgressReporter> {
        match self {
            Self::Off => Box::new(NoProgress),
            Self::Human => Box::new(StderrProgress),
            Self::Json => Box::new(JsonProgress),
        }
    }
}

impl FromStr for ProgressMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mode = s.trim().to_ascii_lowercase();
        match mode.as_str() {
            "off" | "none" => Ok(Self::Off),
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            _ => Err(format!(
                "unknown progress mode '{}': expected off, human or json",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_are_grouped_in_thousands() {
        for (n, expected) in [
            (0, "0"),
            (42, "42"),
            (999, "999"),
            (1000, "1,000"),
            (12_345, "12,345"),
            (1_234_567, "1,234,567"),
        ] {
            assert_eq!(grouped(n), expected);
        }
    }

    #[test]
    fn human_lines() {
        let event = RetrieveProgressEvent::Fetching {
            repo: "core".to_string(),
            n: 3,
            total: 1204,
        };
        assert_eq!(event.to_string(), "retrieve core  fetching  3 / 1,204 repos");
    }

    #[test]
    fn json_lines_carry_phase_tag() {
        let event = RetrieveProgressEvent::Fetched {
            repo: "core".to_string(),
            commits: 12,
        };
        let value = serde_json::to_value(JsonLine {
            event: "progress",
            inner: &event,
        })
        .unwrap();
        assert_eq!(
            value,
            serde_json::json!({"event": "progress", "phase": "fetched", "repo": "core", "commits": 12})
        );
    }

    #[test]
    fn progress_mode_parses() {
        assert_eq!("JSON".parse::<ProgressMode>(), Ok(ProgressMode::Json));
        assert_eq!("none".parse::<ProgressMode>(), Ok(ProgressMode::Off));
        assert!("loud".parse::<ProgressMode>().is_err());
    }
}
