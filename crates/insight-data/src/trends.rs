//! Sentiment volume over time and across releases.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use insight_core::models::{ReviewRecord, SentimentLabel};
use insight_core::time_utils::TimezoneHandler;
use serde::Serialize;

use crate::normalizer::DatasetSnapshot;
use crate::versions::order_versions;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SentimentCounts {
    pub negative: usize,
    pub neutral: usize,
    pub positive: usize,
}

impl SentimentCounts {
    pub fn add(&mut self, label: SentimentLabel) {
        match label {
            SentimentLabel::Negative => self.negative += 1,
            SentimentLabel::Neutral => self.neutral += 1,
            SentimentLabel::Positive => self.positive += 1,
        }
    }

    pub fn get(&self, label: SentimentLabel) -> usize {
        match label {
            SentimentLabel::Negative => self.negative,
            SentimentLabel::Neutral => self.neutral,
            SentimentLabel::Positive => self.positive,
        }
    }

    pub fn total(&self) -> usize {
        self.negative + self.neutral + self.positive
    }

    /// Mean of the numeric sentiment scores (0/50/100) of the counted records.
    pub fn avg_sentiment_score(&self) -> Option<f64> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        let sum: f64 = SentimentLabel::ALL
            .iter()
            .map(|label| self.get(*label) as f64 * label.numeric_score())
            .sum();
        Some(sum / total as f64)
    }
}

impl<'a> FromIterator<&'a ReviewRecord> for SentimentCounts {
    fn from_iter<I: IntoIterator<Item = &'a ReviewRecord>>(iter: I) -> Self {
        let mut counts = SentimentCounts::default();
        for record in iter {
            counts.add(record.sentiment_label);
        }
        counts
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySentiment {
    pub date: NaiveDate,
    pub counts: SentimentCounts,
    pub avg_sentiment_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionSentiment {
    pub version: String,
    pub counts: SentimentCounts,
    pub avg_sentiment_score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SentimentTrend {
    pub daily: Vec<DailySentiment>,
    pub by_version: Vec<VersionSentiment>,
}

/// Per-day sentiment counts in `tz`, oldest day first. Records without a
/// timestamp are left out.
pub fn daily_sentiment(snapshot: &DatasetSnapshot, tz: &TimezoneHandler) -> Vec<DailySentiment> {
    let mut days: BTreeMap<NaiveDate, SentimentCounts> = BTreeMap::new();
    for record in snapshot.records() {
        if let Some(ts) = record.timestamp {
            days.entry(tz.local_date(ts)).or_default().add(record.sentiment_label);
        }
    }
    days.into_iter()
        .map(|(date, counts)| DailySentiment {
            date,
            avg_sentiment_score: counts.avg_sentiment_score(),
            counts,
        })
        .collect()
}

/// Per-version sentiment counts in release order, skipping versions with
/// `min_samples` reviews or fewer.
pub fn version_sentiment(snapshot: &DatasetSnapshot, min_samples: usize) -> Vec<VersionSentiment> {
    let mut versions: BTreeMap<String, (SentimentCounts, Option<DateTime<Utc>>)> = BTreeMap::new();
    for record in snapshot.records() {
        let Some(version) = record.app_version.as_deref() else {
            continue;
        };
        let (counts, first_seen) = versions.entry(version.to_string()).or_default();
        counts.add(record.sentiment_label);
        if let Some(ts) = record.timestamp {
            *first_seen = Some(first_seen.map_or(ts, |seen| seen.min(ts)));
        }
    }

    let first_seen: BTreeMap<String, Option<DateTime<Utc>>> = versions
        .iter()
        .map(|(v, (_, ts))| (v.clone(), *ts))
        .collect();

    order_versions(&first_seen)
        .into_iter()
        .filter_map(|version| {
            let (counts, _) = versions.get(&version)?;
            (counts.total() > min_samples).then(|| VersionSentiment {
                avg_sentiment_score: counts.avg_sentiment_score(),
                counts: *counts,
                version,
            })
        })
        .collect()
}

pub fn sentiment_trend(
    snapshot: &DatasetSnapshot,
    tz: &TimezoneHandler,
    min_samples: usize,
) -> SentimentTrend {
    SentimentTrend {
        daily: daily_sentiment(snapshot, tz),
        by_version: version_sentiment(snapshot, min_samples),
    }
}
