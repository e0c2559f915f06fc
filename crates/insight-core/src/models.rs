use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::InsightError;

/// Cluster id assigned upstream to reviews that did not join any cluster.
pub const NOISE_CLUSTER_ID: &str = "-1";

/// Three-way sentiment class attached to every normalized review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    /// All labels in display order (negative first, as the dashboard shows them).
    pub const ALL: [SentimentLabel; 3] = [
        SentimentLabel::Negative,
        SentimentLabel::Neutral,
        SentimentLabel::Positive,
    ];

    /// Classify a 1–5 star score: `>= 4` positive, `3` neutral, otherwise negative.
    pub fn from_score(score: u8) -> Self {
        if score >= 4 {
            SentimentLabel::Positive
        } else if score == 3 {
            SentimentLabel::Neutral
        } else {
            SentimentLabel::Negative
        }
    }

    /// Numeric sentiment used for averages: Positive 100, Neutral 50, Negative 0.
    pub fn numeric_score(&self) -> f64 {
        match self {
            SentimentLabel::Positive => 100.0,
            SentimentLabel::Neutral => 50.0,
            SentimentLabel::Negative => 0.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "Positive",
            SentimentLabel::Neutral => "Neutral",
            SentimentLabel::Negative => "Negative",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SentimentLabel {
    type Err = InsightError;

    /// Case-insensitive parse of the English label names.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "positive" => Ok(SentimentLabel::Positive),
            "neutral" => Ok(SentimentLabel::Neutral),
            "negative" => Ok(SentimentLabel::Negative),
            other => Err(InsightError::InvalidSentiment(other.to_string())),
        }
    }
}

/// Risk/strength partition used for cluster display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupType {
    #[serde(rename = "Negative (Risk)")]
    NegativeRisk,
    #[serde(rename = "Positive (Strength)")]
    PositiveStrength,
}

impl GroupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupType::NegativeRisk => "Negative (Risk)",
            GroupType::PositiveStrength => "Positive (Strength)",
        }
    }
}

impl fmt::Display for GroupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single review after normalization.
///
/// Every field is typed; values that could not be coerced are `None` (or the
/// documented default) so that each aggregate can decide whether it needs them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    /// Upstream `reviewId`, or the row index when absent.
    pub id: String,
    /// Authoring time; `None` when the source value could not be parsed.
    pub timestamp: Option<DateTime<Utc>>,
    /// Star rating in 1–5; `None` when missing, non-numeric or out of range.
    pub score: Option<u8>,
    /// Review text (may be empty).
    #[serde(default)]
    pub content: String,
    /// Resolved sentiment class.
    pub sentiment_label: SentimentLabel,
    /// Emotional strength indicator (defaults to 1).
    pub intensity: f64,
    /// Cluster identity; [`NOISE_CLUSTER_ID`] for unclustered reviews.
    pub cluster_id: String,
    /// Keyword tokens, never containing empty strings.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Category tokens, never containing empty strings.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Scalar topic taken from the dataset's topic column.
    pub topic: String,
    /// Application version the review was written against.
    #[serde(default)]
    pub app_version: Option<String>,
    /// One-line upstream issue summary.
    #[serde(default)]
    pub issue_summary: Option<String>,
    /// Upstream churn-risk status.
    #[serde(default)]
    pub risk_status: Option<String>,
    /// Helpfulness votes.
    #[serde(default)]
    pub thumbs_up: u32,
}

impl ReviewRecord {
    /// Minimal record used as a starting point by tests and builders.
    pub fn new(id: impl Into<String>, sentiment_label: SentimentLabel) -> Self {
        Self {
            id: id.into(),
            timestamp: None,
            score: None,
            content: String::new(),
            sentiment_label,
            intensity: 1.0,
            cluster_id: NOISE_CLUSTER_ID.to_string(),
            keywords: Vec::new(),
            categories: Vec::new(),
            topic: String::new(),
            app_version: None,
            issue_summary: None,
            risk_status: None,
            thumbs_up: 0,
        }
    }

    /// Whether the record belongs to the unclustered noise bucket.
    pub fn is_noise(&self) -> bool {
        self.cluster_id == NOISE_CLUSTER_ID
    }

    /// First keyword, if any.
    pub fn primary_keyword(&self) -> Option<&str> {
        self.keywords.first().map(String::as_str)
    }

    /// First category, used wherever a scalar category is required.
    pub fn primary_category(&self) -> Option<&str> {
        self.categories.first().map(String::as_str)
    }
}
