//! Filtered review listing with summary KPIs and distributions.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use insight_core::calculations::{mean, ratio, FrequencyTable};
use insight_core::models::{ReviewRecord, SentimentLabel};
use insight_core::time_utils::TimezoneHandler;
use serde::Serialize;

use crate::breakdown::KeywordCount;
use crate::normalizer::DatasetSnapshot;

/// Upstream churn statuses counted as at-risk reviews.
pub const RISK_STATUSES: &[&str] = &["이탈위험", "이탈확정", "불만"];

/// Topics listed in the explorer's topic distribution.
pub const TOP_TOPICS_SHOWN: usize = 10;

/// Review filter. Empty collections and `None` bounds match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewQuery {
    /// Inclusive local-date bounds.
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    /// Drill-down to specific reviews by id (`reviewId`, or the row index).
    pub review_ids: Vec<String>,
    pub versions: Vec<String>,
    pub scores: Vec<u8>,
    /// Matched against the topic and every category of a record.
    pub topics: Vec<String>,
    pub risk_statuses: Vec<String>,
    pub intensity_min: Option<f64>,
    pub intensity_max: Option<f64>,
    /// Case-insensitive substring over content and issue summary.
    pub text: Option<String>,
}

impl ReviewQuery {
    pub fn matches(&self, record: &ReviewRecord, tz: &TimezoneHandler) -> bool {
        if !self.review_ids.is_empty() && !self.review_ids.contains(&record.id) {
            return false;
        }

        if self.date_from.is_some() || self.date_to.is_some() {
            let Some(ts) = record.timestamp else {
                return false;
            };
            let day = tz.local_date(ts);
            if self.date_from.is_some_and(|from| day < from)
                || self.date_to.is_some_and(|to| day > to)
            {
                return false;
            }
        }

        if !self.versions.is_empty()
            && !record
                .app_version
                .as_ref()
                .is_some_and(|v| self.versions.contains(v))
        {
            return false;
        }

        if !self.scores.is_empty() && !record.score.is_some_and(|s| self.scores.contains(&s)) {
            return false;
        }

        if !self.topics.is_empty()
            && !self
                .topics
                .iter()
                .any(|t| record.topic == *t || record.categories.contains(t))
        {
            return false;
        }

        if !self.risk_statuses.is_empty()
            && !record
                .risk_status
                .as_ref()
                .is_some_and(|s| self.risk_statuses.contains(s))
        {
            return false;
        }

        if self.intensity_min.is_some_and(|min| record.intensity < min)
            || self.intensity_max.is_some_and(|max| record.intensity > max)
        {
            return false;
        }

        match self.text.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => {
                let needle = needle.to_lowercase();
                record.content.to_lowercase().contains(&needle)
                    || record
                        .issue_summary
                        .as_ref()
                        .is_some_and(|s| s.to_lowercase().contains(&needle))
            }
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExplorerSummary {
    pub matched: usize,
    pub avg_score: Option<f64>,
    pub risk_reviews: usize,
    /// Fraction of matched reviews labelled Positive.
    pub positive_ratio: f64,
    pub score_distribution: BTreeMap<u8, usize>,
    /// Intensity rounded to the nearest integer.
    pub intensity_distribution: BTreeMap<i64, usize>,
    pub top_topics: Vec<KeywordCount>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExplorerResult {
    pub summary: ExplorerSummary,
    /// Newest first; undated reviews last.
    pub records: Vec<ReviewRecord>,
}

/// Apply `query` to the snapshot.
pub fn explore(snapshot: &DatasetSnapshot, query: &ReviewQuery, tz: &TimezoneHandler) -> ExplorerResult {
    let mut records: Vec<ReviewRecord> = snapshot
        .records()
        .iter()
        .filter(|r| query.matches(r, tz))
        .cloned()
        .collect();
    // `None < Some`, so reversing puts undated records last.
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    ExplorerResult {
        summary: summarize(&records),
        records,
    }
}

fn summarize(records: &[ReviewRecord]) -> ExplorerSummary {
    let mut score_distribution = BTreeMap::new();
    let mut intensity_distribution = BTreeMap::new();
    for record in records {
        if let Some(score) = record.score {
            *score_distribution.entry(score).or_insert(0) += 1;
        }
        *intensity_distribution
            .entry(record.intensity.round() as i64)
            .or_insert(0) += 1;
    }

    let topics: FrequencyTable<&str> = records.iter().map(|r| r.topic.as_str()).collect();
    let positive = records
        .iter()
        .filter(|r| r.sentiment_label == SentimentLabel::Positive)
        .count();

    ExplorerSummary {
        matched: records.len(),
        avg_score: mean(records.iter().filter_map(|r| r.score).map(f64::from)),
        risk_reviews: records
            .iter()
            .filter(|r| {
                r.risk_status
                    .as_deref()
                    .is_some_and(|s| RISK_STATUSES.contains(&s))
            })
            .count(),
        positive_ratio: ratio(positive, records.len()),
        score_distribution,
        intensity_distribution,
        top_topics: topics
            .top(TOP_TOPICS_SHOWN)
            .into_iter()
            .map(|(keyword, count)| KeywordCount {
                keyword: keyword.to_string(),
                count,
            })
            .collect(),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn review(id: &str, day: Option<u32>, score: u8) -> ReviewRecord {
        let mut r = ReviewRecord::new(id, SentimentLabel::from_score(score));
        r.timestamp = day.and_then(|d| Utc.with_ymd_and_hms(2025, 4, d, 9, 0, 0).single());
        r.score = Some(score);
        r.topic = "전투".to_string();
        r.app_version = Some("1.0.0".to_string());
        r
    }

    fn fixture() -> DatasetSnapshot {
        let mut a = review("a", Some(1), 1);
        a.content = "서버 렉이 심해요".to_string();
        a.risk_status = Some("이탈위험".to_string());
        a.intensity = 4.6;
        let mut b = review("b", Some(5), 5);
        b.content = "Great update".to_string();
        b.topic = "스토리".to_string();
        b.app_version = Some("1.1.0".to_string());
        let mut c = review("c", None, 3);
        c.issue_summary = Some("Server LAG after patch".to_string());
        c.categories = vec!["스토리".to_string()];
        let mut d = review("d", Some(3), 2);
        d.risk_status = Some("유지".to_string());
        DatasetSnapshot::from_records(vec![a, b, c, d], &["at", "score", "topic"])
    }

    fn ids(result: &ExplorerResult) -> Vec<&str> {
        result.records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_empty_query_returns_all_newest_first() {
        let result = explore(&fixture(), &ReviewQuery::default(), &TimezoneHandler::default());
        assert_eq!(ids(&result), vec!["b", "d", "a", "c"]);
        assert_eq!(result.summary.matched, 4);
        assert_eq!(result.summary.risk_reviews, 1);
        assert_eq!(result.summary.positive_ratio, 0.25);
        assert_eq!(result.summary.avg_score, Some(2.75));
        assert_eq!(result.summary.score_distribution.get(&3), Some(&1));
        assert_eq!(result.summary.intensity_distribution.get(&5), Some(&1));
        assert_eq!(result.summary.top_topics[0].keyword, "전투");
        assert_eq!(result.summary.top_topics[0].count, 3);
    }

    #[test]
    fn test_date_range_is_inclusive_and_drops_undated() {
        let query = ReviewQuery {
            date_from: NaiveDate::from_ymd_opt(2025, 4, 1),
            date_to: NaiveDate::from_ymd_opt(2025, 4, 3),
            ..Default::default()
        };
        let result = explore(&fixture(), &query, &TimezoneHandler::default());
        assert_eq!(ids(&result), vec!["d", "a"]);
    }

    #[test]
    fn test_text_search_covers_issue_summary() {
        let query = ReviewQuery {
            text: Some("lag".to_string()),
            ..Default::default()
        };
        let result = explore(&fixture(), &query, &TimezoneHandler::default());
        assert_eq!(ids(&result), vec!["c"]);

        let query = ReviewQuery {
            text: Some("렉".to_string()),
            ..Default::default()
        };
        assert_eq!(ids(&explore(&fixture(), &query, &TimezoneHandler::default())), vec!["a"]);
    }

    #[test]
    fn test_topic_matches_categories_too() {
        let query = ReviewQuery {
            topics: vec!["스토리".to_string()],
            ..Default::default()
        };
        let result = explore(&fixture(), &query, &TimezoneHandler::default());
        assert_eq!(ids(&result), vec!["b", "c"]);
    }

    #[test]
    fn test_combined_filters() {
        let query = ReviewQuery {
            versions: vec!["1.0.0".to_string()],
            scores: vec![1, 2],
            intensity_max: Some(2.0),
            ..Default::default()
        };
        let result = explore(&fixture(), &query, &TimezoneHandler::default());
        assert_eq!(ids(&result), vec!["d"]);

        let query = ReviewQuery {
            risk_statuses: vec!["이탈위험".to_string()],
            intensity_min: Some(4.0),
            ..Default::default()
        };
        assert_eq!(ids(&explore(&fixture(), &query, &TimezoneHandler::default())), vec!["a"]);
    }

    #[test]
    fn test_review_id_drill_down() {
        let query = ReviewQuery {
            review_ids: vec!["a".to_string(), "c".to_string(), "zz".to_string()],
            ..Default::default()
        };
        let result = explore(&fixture(), &query, &TimezoneHandler::default());
        assert_eq!(ids(&result), vec!["a", "c"]);
        assert_eq!(result.summary.matched, 2);

        let query = ReviewQuery {
            review_ids: vec!["a".to_string()],
            scores: vec![5],
            ..Default::default()
        };
        assert!(explore(&fixture(), &query, &TimezoneHandler::default()).records.is_empty());
    }

    #[test]
    fn test_no_matches_gives_empty_summary() {
        let query = ReviewQuery {
            text: Some("nothing like this".to_string()),
            ..Default::default()
        };
        let result = explore(&fixture(), &query, &TimezoneHandler::default());
        assert!(result.records.is_empty());
        assert_eq!(result.summary.matched, 0);
        assert_eq!(result.summary.avg_score, None);
        assert_eq!(result.summary.positive_ratio, 0.0);
    }
}
