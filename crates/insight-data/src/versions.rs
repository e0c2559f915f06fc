//! Release-over-release metrics: semantic ordering, per-version scores,
//! signed deltas and the strategic quadrant.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use insight_core::calculations::ratio;
use insight_core::data_processors::{coerce_f64, value_text};
use insight_core::models::SentimentLabel;
use insight_core::thresholds::AnalyticsConfig;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::normalizer::DatasetSnapshot;

/// `(major, minor, patch)`.
pub type VersionTriple = (u64, u64, u64);

fn separator_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[a-zA-Z_-]").expect("regex is valid"))
}

fn digits_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("regex is valid"))
}

/// Parse a version string into a numeric triple.
///
/// Letters, `_` and `-` are removed, then digit groups are read in order,
/// zero-padded to three and truncated to three. Returns `None` when the
/// string contains no digits.
///
/// ```
/// use insight_data::versions::parse_version;
///
/// assert_eq!(parse_version("1.2.3"), Some((1, 2, 3)));
/// assert_eq!(parse_version("v1.2"), Some((1, 2, 0)));
/// assert_eq!(parse_version("1.2.3.4"), Some((1, 2, 3)));
/// assert_eq!(parse_version("beta"), None);
/// ```
pub fn parse_version(version: &str) -> Option<VersionTriple> {
    let cleaned = separator_regex().replace_all(version, "");
    let mut groups = digits_regex()
        .find_iter(&cleaned)
        .map(|m| m.as_str().parse::<u64>().unwrap_or(u64::MAX));

    let major = groups.next()?;
    let minor = groups.next().unwrap_or(0);
    let patch = groups.next().unwrap_or(0);
    Some((major, minor, patch))
}

/// Order versions semantically when every one of them parses; otherwise
/// order the whole set by earliest review timestamp. Ties fall back to the
/// version string.
pub fn order_versions(first_seen: &BTreeMap<String, Option<DateTime<Utc>>>) -> Vec<String> {
    let parsed: Option<Vec<(VersionTriple, &String)>> = first_seen
        .keys()
        .map(|v| parse_version(v).map(|t| (t, v)))
        .collect();

    match parsed {
        Some(mut triples) => {
            triples.sort();
            triples.into_iter().map(|(_, v)| v.clone()).collect()
        }
        None => {
            debug!("Unparseable version present, ordering by first review time");
            let mut by_time: Vec<(&String, &Option<DateTime<Utc>>)> = first_seen.iter().collect();
            by_time.sort_by(|a, b| match (a.1, b.1) {
                (Some(x), Some(y)) => x.cmp(y).then_with(|| a.0.cmp(b.0)),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => a.0.cmp(b.0),
            });
            by_time.into_iter().map(|(v, _)| v.clone()).collect()
        }
    }
}

// ── Upstream scores ───────────────────────────────────────────────────────────

/// Defect and growth scores computed upstream for one version.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpstreamVersionScore {
    pub defect_score: Option<f64>,
    pub growth_score: Option<f64>,
}

/// Upstream per-version scores keyed by version string.
#[derive(Debug, Clone, Default)]
pub struct VersionScoreTable {
    scores: HashMap<String, UpstreamVersionScore>,
}

impl VersionScoreTable {
    /// Build from rows shaped like `{"version": "1.2.0", "defect_score": 0.3, ...}`.
    /// Rows without a version are ignored.
    pub fn from_rows(rows: &[Value]) -> Self {
        let scores = rows
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|row| {
                let version = ["version", "appVersion"]
                    .iter()
                    .find_map(|c| row.get(*c).and_then(value_text))?;
                let score = UpstreamVersionScore {
                    defect_score: row.get("defect_score").and_then(coerce_f64),
                    growth_score: row.get("growth_score").and_then(coerce_f64),
                };
                Some((version, score))
            })
            .collect();
        Self { scores }
    }

    pub fn get(&self, version: &str) -> Option<&UpstreamVersionScore> {
        self.scores.get(version)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

// ── Aggregates ────────────────────────────────────────────────────────────────

/// Volume change crossed with sentiment change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Quadrant {
    /// More reviews, better sentiment.
    MegaHit,
    /// More reviews, worse or flat sentiment.
    Crisis,
    /// Fewer reviews, worse or flat sentiment.
    Stagnant,
    /// Fewer reviews, better sentiment.
    SolidNiche,
}

impl Quadrant {
    pub fn classify(delta_volume: i64, delta_sentiment: f64) -> Self {
        match (delta_volume > 0, delta_sentiment > 0.0) {
            (true, true) => Quadrant::MegaHit,
            (true, false) => Quadrant::Crisis,
            (false, false) => Quadrant::Stagnant,
            (false, true) => Quadrant::SolidNiche,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Quadrant::MegaHit => "Mega Hit",
            Quadrant::Crisis => "Crisis",
            Quadrant::Stagnant => "Stagnant",
            Quadrant::SolidNiche => "Solid Niche",
        }
    }
}

impl fmt::Display for Quadrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionAggregate {
    pub version: String,
    pub review_count: usize,
    /// Fraction of reviews labelled Positive.
    pub sentiment_score: f64,
    pub defect_score: Option<f64>,
    pub growth_score: Option<f64>,
    /// `None` for the first version in order.
    pub delta_volume: Option<i64>,
    pub delta_sentiment: Option<f64>,
    pub delta_defect: Option<f64>,
    pub delta_growth: Option<f64>,
}

impl VersionAggregate {
    /// Quadrant derived from the volume and sentiment deltas.
    pub fn quadrant(&self) -> Option<Quadrant> {
        Some(Quadrant::classify(self.delta_volume?, self.delta_sentiment?))
    }
}

/// Sentiment change of the newest version against its predecessor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentBridge {
    pub version: String,
    pub previous: Option<f64>,
    pub delta: Option<f64>,
    pub current: f64,
}

/// Kept versions in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VersionTrend {
    pub versions: Vec<VersionAggregate>,
}

impl VersionTrend {
    /// The newest `n` versions, oldest first.
    pub fn latest(&self, n: usize) -> &[VersionAggregate] {
        let start = self.versions.len().saturating_sub(n);
        &self.versions[start..]
    }

    /// Sentiment bridge for the newest version inside the `n`-version window.
    pub fn sentiment_bridge(&self, n: usize) -> Option<SentimentBridge> {
        let window = self.latest(n);
        let (current, earlier) = window.split_last()?;
        Some(SentimentBridge {
            version: current.version.clone(),
            previous: earlier.last().map(|v| v.sentiment_score),
            delta: current.delta_sentiment,
            current: current.sentiment_score,
        })
    }
}

// ── VersionDeltaEngine ────────────────────────────────────────────────────────

#[derive(Default)]
struct VersionStats {
    count: usize,
    positive: usize,
    first_seen: Option<DateTime<Utc>>,
}

/// Review count, first timestamp and positive count per app version.
pub(crate) fn collect_version_stats(
    snapshot: &DatasetSnapshot,
) -> BTreeMap<String, (usize, usize, Option<DateTime<Utc>>)> {
    let mut stats: BTreeMap<String, VersionStats> = BTreeMap::new();
    for record in snapshot.records() {
        let Some(version) = record.app_version.as_deref() else {
            continue;
        };
        let entry = stats.entry(version.to_string()).or_default();
        entry.count += 1;
        if record.sentiment_label == SentimentLabel::Positive {
            entry.positive += 1;
        }
        if let Some(ts) = record.timestamp {
            entry.first_seen = Some(entry.first_seen.map_or(ts, |seen| seen.min(ts)));
        }
    }
    stats
        .into_iter()
        .map(|(v, s)| (v, (s.count, s.positive, s.first_seen)))
        .collect()
}

/// Builds the per-version trend with deltas.
pub struct VersionDeltaEngine<'a> {
    config: &'a AnalyticsConfig,
}

impl<'a> VersionDeltaEngine<'a> {
    pub fn new(config: &'a AnalyticsConfig) -> Self {
        Self { config }
    }

    /// Aggregate every version with more than the configured number of
    /// reviews and diff each against the preceding kept version.
    pub fn build(&self, snapshot: &DatasetSnapshot, upstream: &VersionScoreTable) -> VersionTrend {
        let stats = collect_version_stats(snapshot);
        let first_seen: BTreeMap<String, Option<DateTime<Utc>>> = stats
            .iter()
            .map(|(v, (_, _, ts))| (v.clone(), *ts))
            .collect();

        let mut versions: Vec<VersionAggregate> = Vec::new();
        for version in order_versions(&first_seen) {
            let Some(&(count, positive, _)) = stats.get(&version) else {
                continue;
            };
            if count <= self.config.min_version_samples {
                debug!("Skipping version {} with {} reviews", version, count);
                continue;
            }
            let scores = upstream.get(&version).cloned().unwrap_or_default();
            let mut aggregate = VersionAggregate {
                version,
                review_count: count,
                sentiment_score: ratio(positive, count),
                defect_score: scores.defect_score,
                growth_score: scores.growth_score,
                delta_volume: None,
                delta_sentiment: None,
                delta_defect: None,
                delta_growth: None,
            };
            if let Some(prev) = versions.last() {
                aggregate.delta_volume = Some(count as i64 - prev.review_count as i64);
                aggregate.delta_sentiment = Some(aggregate.sentiment_score - prev.sentiment_score);
                aggregate.delta_defect = diff(aggregate.defect_score, prev.defect_score);
                aggregate.delta_growth = diff(aggregate.growth_score, prev.growth_score);
            }
            versions.push(aggregate);
        }

        VersionTrend { versions }
    }
}

fn diff(current: Option<f64>, previous: Option<f64>) -> Option<f64> {
    Some(current? - previous?)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use insight_core::models::ReviewRecord;
    use serde_json::json;

    fn records(version: &str, n: usize, positive: usize, day: u32) -> Vec<ReviewRecord> {
        (0..n)
            .map(|i| {
                let label = if i < positive {
                    SentimentLabel::Positive
                } else {
                    SentimentLabel::Negative
                };
                let mut r = ReviewRecord::new(format!("{}-{}", version, i), label);
                r.app_version = Some(version.to_string());
                r.timestamp = Utc.with_ymd_and_hms(2025, 1, day, 12, 0, 0).single();
                r
            })
            .collect()
    }

    fn snapshot(parts: Vec<Vec<ReviewRecord>>) -> DatasetSnapshot {
        DatasetSnapshot::from_records(parts.into_iter().flatten().collect(), &["appVersion"])
    }

    #[test]
    fn test_parse_version_triples() {
        assert_eq!(parse_version("1.2.3"), Some((1, 2, 3)));
        assert_eq!(parse_version("v1.2"), Some((1, 2, 0)));
        assert_eq!(parse_version("1.2.3.4"), Some((1, 2, 3)));
        assert_eq!(parse_version("release-2_10"), Some((210, 0, 0)));
        assert_eq!(parse_version("10"), Some((10, 0, 0)));
        assert_eq!(parse_version(""), None);
        assert_eq!(parse_version("latest"), None);
    }

    #[test]
    fn test_semantic_order_beats_lexical() {
        let first_seen: BTreeMap<String, Option<DateTime<Utc>>> =
            ["1.10.0", "1.9.2", "1.2"].iter().map(|v| (v.to_string(), None)).collect();
        assert_eq!(order_versions(&first_seen), vec!["1.2", "1.9.2", "1.10.0"]);
    }

    #[test]
    fn test_unparseable_version_orders_by_time() {
        let t = |d: u32| Utc.with_ymd_and_hms(2025, 1, d, 0, 0, 0).single();
        let first_seen: BTreeMap<String, Option<DateTime<Utc>>> = [
            ("2.0.0".to_string(), t(5)),
            ("beta".to_string(), t(1)),
            ("1.0.0".to_string(), t(9)),
            ("0.9.0".to_string(), None),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            order_versions(&first_seen),
            vec!["beta", "2.0.0", "1.0.0", "0.9.0"]
        );
    }

    #[test]
    fn test_deltas_against_previous_version() {
        let snap = snapshot(vec![
            records("1.1.0", 20, 10, 1),
            records("1.0.0", 12, 3, 2),
            records("1.2.0", 30, 24, 3),
        ]);
        let config = AnalyticsConfig::default();
        let trend = VersionDeltaEngine::new(&config).build(&snap, &VersionScoreTable::default());

        let order: Vec<&str> = trend.versions.iter().map(|v| v.version.as_str()).collect();
        assert_eq!(order, vec!["1.0.0", "1.1.0", "1.2.0"]);

        let first = &trend.versions[0];
        assert_eq!(first.delta_volume, None);
        assert_eq!(first.delta_sentiment, None);
        assert_eq!(first.quadrant(), None);

        let second = &trend.versions[1];
        assert_eq!(second.delta_volume, Some(8));
        assert!((second.delta_sentiment.unwrap() - (0.5 - 0.25)).abs() < 1e-9);
        assert_eq!(second.quadrant(), Some(Quadrant::MegaHit));

        let third = &trend.versions[2];
        assert!((third.sentiment_score - 0.8).abs() < 1e-9);
        assert!((third.delta_sentiment.unwrap() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_small_versions_excluded() {
        let snap = snapshot(vec![records("1.0.0", 10, 5, 1), records("1.1.0", 11, 5, 2)]);
        let config = AnalyticsConfig::default();
        let trend = VersionDeltaEngine::new(&config).build(&snap, &VersionScoreTable::default());
        assert_eq!(trend.versions.len(), 1);
        assert_eq!(trend.versions[0].version, "1.1.0");
        assert_eq!(trend.versions[0].delta_volume, None);
    }

    #[test]
    fn test_upstream_scores_passed_through_and_diffed() {
        let table = VersionScoreTable::from_rows(&[
            json!({"version": "1.0.0", "defect_score": 0.40, "growth_score": 0.10}),
            json!({"version": "1.1.0", "defect_score": "0.25"}),
            json!({"defect_score": 9.0}),
        ]);
        assert_eq!(table.len(), 2);

        let snap = snapshot(vec![records("1.0.0", 15, 5, 1), records("1.1.0", 12, 6, 2)]);
        let config = AnalyticsConfig::default();
        let trend = VersionDeltaEngine::new(&config).build(&snap, &table);

        let second = &trend.versions[1];
        assert_eq!(second.defect_score, Some(0.25));
        assert!((second.delta_defect.unwrap() + 0.15).abs() < 1e-9);
        assert_eq!(second.growth_score, None);
        assert_eq!(second.delta_growth, None);
        assert_eq!(second.delta_volume, Some(-3));
        assert_eq!(second.quadrant(), Some(Quadrant::SolidNiche));
    }

    #[test]
    fn test_quadrant_classification() {
        assert_eq!(Quadrant::classify(5, 0.1), Quadrant::MegaHit);
        assert_eq!(Quadrant::classify(5, -0.1), Quadrant::Crisis);
        assert_eq!(Quadrant::classify(0, 0.0), Quadrant::Stagnant);
        assert_eq!(Quadrant::classify(-2, 0.2), Quadrant::SolidNiche);
    }

    #[test]
    fn test_latest_window_and_bridge() {
        let snap = snapshot(vec![
            records("1.0.0", 20, 5, 1),
            records("1.1.0", 20, 10, 2),
            records("1.2.0", 20, 15, 3),
        ]);
        let config = AnalyticsConfig::default();
        let trend = VersionDeltaEngine::new(&config).build(&snap, &VersionScoreTable::default());

        let window = trend.latest(2);
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].version, "1.1.0");
        assert_eq!(trend.latest(10).len(), 3);

        let bridge = trend.sentiment_bridge(2).unwrap();
        assert_eq!(bridge.version, "1.2.0");
        assert_eq!(bridge.previous, Some(0.5));
        assert!((bridge.delta.unwrap() - 0.25).abs() < 1e-9);
        assert_eq!(bridge.current, 0.75);

        assert!(VersionTrend::default().sentiment_bridge(5).is_none());
    }
}
