//! Raw review rows → typed [`ReviewRecord`]s wrapped in a [`DatasetSnapshot`].
//!
//! Every coercion is best-effort: a value that cannot be read becomes `None`
//! or its documented default, and the row is kept.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use insight_core::data_processors::{
    coerce_f64, coerce_score, parse_list, resolve_first, stringify_cluster_id, value_text,
    TimestampProcessor,
};
use insight_core::models::{ReviewRecord, SentimentLabel};
use insight_core::thresholds::AnalyticsConfig;
use insight_core::time_utils::TimezoneHandler;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Topic columns in precedence order.
pub const TOPIC_COLUMNS: &[&str] = &[
    "refined_topic",
    "cluster_label",
    "categories",
    "category",
    "topic",
    "issue_summary",
];

/// App-version columns in precedence order.
pub const VERSION_COLUMNS: &[&str] = &["appVersion", "reviewCreatedVersion", "version"];

/// Cluster identity columns in precedence order.
pub const CLUSTER_COLUMNS: &[&str] = &["cluster", "cluster_id"];

/// Topic assigned to every record when the dataset has no topic column.
pub const DEFAULT_TOPIC: &str = "General";

/// Bucket for empty or bracket-only topic values.
pub const EMPTY_TOPIC: &str = "Etc";

const POSITIVE_TOKEN: &str = "긍정";
const NEGATIVE_TOKEN: &str = "부정";

// ── DatasetSnapshot ───────────────────────────────────────────────────────────

/// Immutable result of normalization, shared by reference with every view.
#[derive(Debug, Clone, Default)]
pub struct DatasetSnapshot {
    records: Vec<ReviewRecord>,
    columns: BTreeSet<String>,
    topic_column: Option<String>,
    dropped: usize,
}

impl DatasetSnapshot {
    /// Build a snapshot directly from typed records.
    pub fn from_records(records: Vec<ReviewRecord>, columns: &[&str]) -> Self {
        let columns: BTreeSet<String> = columns.iter().map(|c| c.to_string()).collect();
        let topic_column =
            resolve_first(TOPIC_COLUMNS, |c| columns.contains(c)).map(str::to_string);
        Self {
            records,
            columns,
            topic_column,
            dropped: 0,
        }
    }

    pub fn records(&self) -> &[ReviewRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Column names seen anywhere in the raw input.
    pub fn columns(&self) -> &BTreeSet<String> {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains(name)
    }

    /// The column topics were read from, if any existed.
    pub fn topic_column(&self) -> Option<&str> {
        self.topic_column.as_deref()
    }

    /// Rows removed by the language filter or for not being JSON objects.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Records that carry a parsed timestamp.
    pub fn timed_records(&self) -> impl Iterator<Item = &ReviewRecord> {
        self.records.iter().filter(|r| r.timestamp.is_some())
    }
}

// ── RecordNormalizer ──────────────────────────────────────────────────────────

/// Coerces raw JSON rows into the canonical review schema.
pub struct RecordNormalizer<'a> {
    config: &'a AnalyticsConfig,
    tz: TimezoneHandler,
}

/// Column choices made once per dataset.
struct ColumnPlan<'c> {
    topic: Option<&'c str>,
    version: Option<&'c str>,
    cluster: Option<&'c str>,
    categories: &'c str,
}

impl<'a> RecordNormalizer<'a> {
    pub fn new(config: &'a AnalyticsConfig, tz: TimezoneHandler) -> Self {
        Self { config, tz }
    }

    /// Normalize every row of `raw`. Rows that are not JSON objects are skipped.
    pub fn normalize(&self, raw: &[Value]) -> DatasetSnapshot {
        let columns: BTreeSet<String> = raw
            .iter()
            .filter_map(Value::as_object)
            .flat_map(|row| row.keys().cloned())
            .collect();

        let available = |c: &str| columns.contains(c);
        let plan = ColumnPlan {
            topic: resolve_first(TOPIC_COLUMNS, available),
            version: resolve_first(VERSION_COLUMNS, available),
            cluster: resolve_first(CLUSTER_COLUMNS, available),
            categories: if available("refined_category") {
                "refined_category"
            } else {
                "categories"
            },
        };
        debug!(
            "Column plan: topic={:?}, version={:?}, cluster={:?}, categories={}",
            plan.topic, plan.version, plan.cluster, plan.categories
        );

        let mut records = Vec::with_capacity(raw.len());
        let mut dropped = 0usize;
        let mut bad_timestamps = 0usize;

        for (index, value) in raw.iter().enumerate() {
            let Some(row) = value.as_object() else {
                dropped += 1;
                continue;
            };
            let record = self.normalize_row(index, row, &plan, &mut bad_timestamps);

            if let Some(min_ratio) = self.config.min_hangul_ratio {
                if hangul_ratio(&record.content) < min_ratio {
                    dropped += 1;
                    continue;
                }
            }
            records.push(record);
        }

        if bad_timestamps > 0 {
            warn!(
                "{} of {} rows have an unparseable timestamp",
                bad_timestamps,
                raw.len()
            );
        }
        debug!(
            "Normalized {} records ({} dropped)",
            records.len(),
            dropped
        );

        DatasetSnapshot {
            records,
            topic_column: plan.topic.map(str::to_string),
            columns,
            dropped,
        }
    }

    fn normalize_row(
        &self,
        index: usize,
        row: &Map<String, Value>,
        plan: &ColumnPlan<'_>,
        bad_timestamps: &mut usize,
    ) -> ReviewRecord {
        let timestamp = match row.get("at") {
            None | Some(Value::Null) => None,
            Some(raw) => {
                let parsed = TimestampProcessor::parse(raw, &self.tz);
                if parsed.is_none() {
                    *bad_timestamps += 1;
                    debug!("Row {}: unparseable timestamp {}", index, raw);
                }
                parsed
            }
        };

        let score = row.get("score").and_then(coerce_score);

        let content = ["content", "content_clean"]
            .iter()
            .find_map(|c| row.get(*c).and_then(value_text))
            .unwrap_or_default();

        ReviewRecord {
            id: row
                .get("reviewId")
                .and_then(value_text)
                .unwrap_or_else(|| index.to_string()),
            timestamp,
            score,
            content,
            sentiment_label: resolve_sentiment(row.get("sentiment"), row.get("sentiment_label"), score),
            intensity: row
                .get("intensity")
                .and_then(coerce_f64)
                .unwrap_or(self.config.default_intensity),
            cluster_id: stringify_cluster_id(plan.cluster.and_then(|c| row.get(c))),
            keywords: parse_list(row.get("keywords")),
            categories: parse_list(row.get(plan.categories)),
            topic: match plan.topic {
                None => DEFAULT_TOPIC.to_string(),
                // Topics read from "categories" honour the refined_category override.
                Some("categories") => clean_topic(row.get(plan.categories)),
                Some(column) => clean_topic(row.get(column)),
            },
            app_version: plan.version.and_then(|c| row.get(c)).and_then(value_text),
            issue_summary: row.get("issue_summary").and_then(value_text),
            risk_status: row.get("risk_status").and_then(value_text),
            thumbs_up: row
                .get("thumbsUpCount")
                .and_then(coerce_f64)
                .map(|n| n.max(0.0).min(u32::MAX as f64) as u32)
                .unwrap_or(0),
        }
    }
}

// ── Field rules ───────────────────────────────────────────────────────────────

/// Resolve the sentiment class of a row.
///
/// A non-empty `sentiment` string wins and is mapped through the fixed
/// vocabulary; an exact English `sentiment_label` comes next; then the star
/// score; Neutral when nothing is known.
pub fn resolve_sentiment(
    sentiment: Option<&Value>,
    sentiment_label: Option<&Value>,
    score: Option<u8>,
) -> SentimentLabel {
    if let Some(Value::String(s)) = sentiment {
        if !s.trim().is_empty() {
            return map_sentiment_token(s);
        }
    }
    if let Some(label) = sentiment_label
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<SentimentLabel>().ok())
    {
        return label;
    }
    score
        .map(SentimentLabel::from_score)
        .unwrap_or(SentimentLabel::Neutral)
}

/// Map a sentiment token onto the three classes by exact match after
/// trimming. Anything other than 긍정/부정 is Neutral.
pub fn map_sentiment_token(token: &str) -> SentimentLabel {
    match token.trim() {
        POSITIVE_TOKEN => SentimentLabel::Positive,
        NEGATIVE_TOKEN => SentimentLabel::Negative,
        _ => SentimentLabel::Neutral,
    }
}

/// Reduce a topic value to a scalar: first element of list-shaped values,
/// `"Etc"` for empty or bracket-only ones, other strings unchanged.
pub fn clean_topic(value: Option<&Value>) -> String {
    let first = |v: Option<&Value>| {
        parse_list(v)
            .into_iter()
            .next()
            .unwrap_or_else(|| EMPTY_TOPIC.to_string())
    };
    match value {
        None | Some(Value::Null) => EMPTY_TOPIC.to_string(),
        Some(Value::Array(_)) => first(value),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() || s == "[]" {
                EMPTY_TOPIC.to_string()
            } else if s.starts_with('[') && s.ends_with(']') {
                first(value)
            } else {
                s.to_string()
            }
        }
        Some(other) => value_text(other).unwrap_or_else(|| EMPTY_TOPIC.to_string()),
    }
}

fn hangul_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\p{Hangul}").expect("regex is valid"))
}

/// Share of non-whitespace characters in `text` that are Hangul.
pub fn hangul_ratio(text: &str) -> f64 {
    let total = text.chars().filter(|c| !c.is_whitespace()).count();
    if total == 0 {
        return 0.0;
    }
    hangul_regex().find_iter(text).count() as f64 / total as f64
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use insight_core::models::NOISE_CLUSTER_ID;
    use serde_json::json;

    fn normalize(rows: Vec<Value>) -> DatasetSnapshot {
        let config = AnalyticsConfig::default();
        RecordNormalizer::new(&config, TimezoneHandler::default()).normalize(&rows)
    }

    #[test]
    fn test_sentiment_fallback_from_score() {
        let snapshot = normalize(vec![
            json!({"score": 5, "sentiment": null}),
            json!({"score": 2, "sentiment": null}),
            json!({"score": 3, "sentiment": null}),
        ]);
        let labels: Vec<SentimentLabel> =
            snapshot.records().iter().map(|r| r.sentiment_label).collect();
        assert_eq!(
            labels,
            vec![
                SentimentLabel::Positive,
                SentimentLabel::Negative,
                SentimentLabel::Neutral
            ]
        );
    }

    #[test]
    fn test_sentiment_vocabulary_wins_over_score() {
        let snapshot = normalize(vec![
            json!({"score": 1, "sentiment": " 긍정 "}),
            json!({"score": 5, "sentiment": "부정"}),
            json!({"score": 5, "sentiment": "중립"}),
            json!({"score": 1, "sentiment": "", "sentiment_label": "Positive"}),
            json!({}),
        ]);
        let labels: Vec<SentimentLabel> =
            snapshot.records().iter().map(|r| r.sentiment_label).collect();
        assert_eq!(
            labels,
            vec![
                SentimentLabel::Positive,
                SentimentLabel::Negative,
                SentimentLabel::Neutral,
                SentimentLabel::Positive,
                SentimentLabel::Neutral,
            ]
        );
    }

    #[test]
    fn test_sentiment_tokens_match_exactly() {
        assert_eq!(map_sentiment_token("\t긍정\n"), SentimentLabel::Positive);
        assert_eq!(map_sentiment_token("부정 "), SentimentLabel::Negative);
        for token in ["Positive", "pos", "negative", "NEG", "매우 긍정"] {
            assert_eq!(map_sentiment_token(token), SentimentLabel::Neutral, "{}", token);
        }

        let snapshot = normalize(vec![
            json!({"score": 5, "sentiment": "Positive"}),
            json!({"score": 1, "sentiment": "pos"}),
        ]);
        let labels: Vec<SentimentLabel> =
            snapshot.records().iter().map(|r| r.sentiment_label).collect();
        assert_eq!(labels, vec![SentimentLabel::Neutral, SentimentLabel::Neutral]);
    }

    #[test]
    fn test_keyword_encodings_normalize_identically() {
        let snapshot = normalize(vec![
            json!({"keywords": "['렉', '과금']"}),
            json!({"keywords": "렉, 과금"}),
            json!({"keywords": ["렉", "과금"]}),
            json!({"keywords": "[\"렉\", \"과금\"]"}),
        ]);
        let expected = vec!["렉".to_string(), "과금".to_string()];
        for record in snapshot.records() {
            assert_eq!(record.keywords, expected, "record {}", record.id);
        }
    }

    #[test]
    fn test_score_coercion_and_defaults() {
        let snapshot = normalize(vec![
            json!({"score": "4.7", "intensity": "3"}),
            json!({"score": 9, "intensity": "high"}),
            json!({"score": "bad"}),
        ]);
        let r = snapshot.records();
        assert_eq!(r[0].score, Some(4));
        assert_eq!(r[0].intensity, 3.0);
        assert_eq!(r[1].score, None);
        assert_eq!(r[1].intensity, 1.0);
        assert_eq!(r[2].score, None);
        assert!(r.iter().all(|rec| rec.cluster_id == NOISE_CLUSTER_ID));
    }

    #[test]
    fn test_cluster_id_stringified() {
        let snapshot = normalize(vec![
            json!({"cluster": 3}),
            json!({"cluster": 4.0}),
            json!({"cluster": "N-2"}),
            json!({"cluster": ""}),
            json!({"cluster": null}),
        ]);
        let ids: Vec<&str> = snapshot.records().iter().map(|r| r.cluster_id.as_str()).collect();
        assert_eq!(ids, vec!["3", "4", "N-2", "-1", "-1"]);
    }

    #[test]
    fn test_bad_timestamp_keeps_record() {
        let snapshot = normalize(vec![
            json!({"at": "2025-12-01 10:00:00", "reviewId": "a"}),
            json!({"at": "yesterday", "reviewId": "b"}),
        ]);
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.records()[0].timestamp.is_some());
        assert!(snapshot.records()[1].timestamp.is_none());
        assert_eq!(snapshot.timed_records().count(), 1);
    }

    #[test]
    fn test_topic_column_precedence_and_cleanup() {
        let snapshot = normalize(vec![
            json!({"categories": "['전투', 'UI']", "topic": "ignored"}),
            json!({"categories": "[]"}),
            json!({"categories": "성장"}),
        ]);
        assert_eq!(snapshot.topic_column(), Some("categories"));
        let topics: Vec<&str> = snapshot.records().iter().map(|r| r.topic.as_str()).collect();
        assert_eq!(topics, vec!["전투", "Etc", "성장"]);
    }

    #[test]
    fn test_refined_category_overrides_categories() {
        let snapshot = normalize(vec![json!({
            "categories": "['old']",
            "refined_category": "['new']"
        })]);
        let record = &snapshot.records()[0];
        assert_eq!(record.categories, vec!["new".to_string()]);
        assert_eq!(record.topic, "new");
    }

    #[test]
    fn test_missing_topic_column_is_general() {
        let snapshot = normalize(vec![json!({"score": 4})]);
        assert_eq!(snapshot.topic_column(), None);
        assert_eq!(snapshot.records()[0].topic, DEFAULT_TOPIC);
    }

    #[test]
    fn test_content_falls_back_to_content_clean_and_version_columns() {
        let snapshot = normalize(vec![json!({
            "content_clean": "업데이트 후 렉",
            "reviewCreatedVersion": "1.2.0",
            "thumbsUpCount": 7
        })]);
        let record = &snapshot.records()[0];
        assert_eq!(record.content, "업데이트 후 렉");
        assert_eq!(record.app_version.as_deref(), Some("1.2.0"));
        assert_eq!(record.thumbs_up, 7);
        assert_eq!(record.id, "0");
    }

    #[test]
    fn test_non_object_rows_are_dropped() {
        let snapshot = normalize(vec![json!([1, 2]), json!({"score": 3})]);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.dropped(), 1);
        assert_eq!(snapshot.records()[0].id, "1");
    }

    #[test]
    fn test_hangul_filter() {
        let config = AnalyticsConfig {
            min_hangul_ratio: Some(0.6),
            ..Default::default()
        };
        let rows = vec![
            json!({"content": "게임이 너무 재밌어요"}),
            json!({"content": "great game, love it"}),
        ];
        let snapshot = RecordNormalizer::new(&config, TimezoneHandler::default()).normalize(&rows);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.dropped(), 1);
    }

    #[test]
    fn test_hangul_ratio() {
        assert_eq!(hangul_ratio(""), 0.0);
        assert_eq!(hangul_ratio("렉 심함"), 1.0);
        assert!((hangul_ratio("렉ab") - 1.0 / 3.0).abs() < 1e-9);
    }
}
