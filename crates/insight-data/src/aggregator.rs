//! Per-cluster statistics, impact scoring and the risk/strength partition.

use std::collections::BTreeMap;

use insight_core::calculations::{mean, FrequencyTable};
use insight_core::models::{GroupType, ReviewRecord, SentimentLabel};
use insight_core::thresholds::AnalyticsConfig;
use serde::Serialize;

use crate::normalizer::DatasetSnapshot;

/// Category reported for clusters whose records carry none.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

// ── ClusterAggregate ──────────────────────────────────────────────────────────

/// Statistics for one cluster of reviews.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterAggregate {
    pub cluster_id: String,
    pub count: usize,
    pub avg_intensity: f64,
    /// Mean star score over records that have one.
    pub avg_score: Option<f64>,
    pub dominant_sentiment: SentimentLabel,
    pub dominant_category: String,
    /// `count × avg_intensity`.
    pub impact_score: f64,
    pub group_type: GroupType,
    pub top_keywords: Vec<String>,
    pub keywords_label: String,
}

/// The highest-impact clusters of each group.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClusterPartition {
    pub risks: Vec<ClusterAggregate>,
    pub strengths: Vec<ClusterAggregate>,
}

impl ClusterPartition {
    pub fn is_empty(&self) -> bool {
        self.risks.is_empty() && self.strengths.is_empty()
    }
}

// ── ClusterAggregator ─────────────────────────────────────────────────────────

/// Groups records by cluster identity and scores each group.
pub struct ClusterAggregator<'a> {
    config: &'a AnalyticsConfig,
}

impl<'a> ClusterAggregator<'a> {
    pub fn new(config: &'a AnalyticsConfig) -> Self {
        Self { config }
    }

    /// Aggregate every non-noise cluster, ordered by cluster id.
    pub fn aggregate(&self, snapshot: &DatasetSnapshot) -> Vec<ClusterAggregate> {
        let mut clusters: BTreeMap<&str, Vec<&ReviewRecord>> = BTreeMap::new();
        for record in snapshot.records().iter().filter(|r| !r.is_noise()) {
            clusters.entry(record.cluster_id.as_str()).or_default().push(record);
        }

        clusters
            .into_iter()
            .map(|(cluster_id, records)| self.aggregate_cluster(cluster_id, &records))
            .collect()
    }

    /// Aggregate and keep the top clusters by impact within each group.
    pub fn partition(&self, snapshot: &DatasetSnapshot) -> ClusterPartition {
        Self::select_top(self.aggregate(snapshot), self.config.top_clusters_per_group)
    }

    /// Split `aggregates` by group and keep the `n` highest impact scores of
    /// each. Equal scores keep their incoming order.
    pub fn select_top(aggregates: Vec<ClusterAggregate>, n: usize) -> ClusterPartition {
        let (mut risks, mut strengths): (Vec<_>, Vec<_>) = aggregates
            .into_iter()
            .partition(|a| a.group_type == GroupType::NegativeRisk);

        for group in [&mut risks, &mut strengths] {
            group.sort_by(|a, b| b.impact_score.total_cmp(&a.impact_score));
            group.truncate(n);
        }

        ClusterPartition { risks, strengths }
    }

    /// Group of a cluster: an `N-`/`P-` prefix decides outright, otherwise the
    /// average score is compared with `threshold`. Clusters without any score
    /// are treated as risks.
    pub fn classify(cluster_id: &str, avg_score: Option<f64>, threshold: f64) -> GroupType {
        if cluster_id.starts_with("N-") {
            return GroupType::NegativeRisk;
        }
        if cluster_id.starts_with("P-") {
            return GroupType::PositiveStrength;
        }
        match avg_score {
            Some(score) if score > threshold => GroupType::PositiveStrength,
            _ => GroupType::NegativeRisk,
        }
    }

    /// Most frequent keywords among the first `sample` records.
    pub fn cluster_keywords(records: &[&ReviewRecord], sample: usize, top: usize) -> Vec<String> {
        let table: FrequencyTable<&str> = records
            .iter()
            .take(sample)
            .flat_map(|r| r.keywords.iter().map(String::as_str))
            .collect();
        table
            .top(top)
            .into_iter()
            .map(|(keyword, _)| keyword.to_string())
            .collect()
    }

    fn aggregate_cluster(&self, cluster_id: &str, records: &[&ReviewRecord]) -> ClusterAggregate {
        let count = records.len();
        let avg_intensity = mean(records.iter().map(|r| r.intensity)).unwrap_or(0.0);
        let avg_score = mean(records.iter().filter_map(|r| r.score).map(f64::from));

        let dominant_sentiment = records
            .iter()
            .map(|r| r.sentiment_label)
            .collect::<FrequencyTable<_>>()
            .mode()
            .unwrap_or(SentimentLabel::Neutral);
        let dominant_category = records
            .iter()
            .map(|r| r.primary_category().unwrap_or(UNKNOWN_CATEGORY))
            .collect::<FrequencyTable<_>>()
            .mode()
            .unwrap_or(UNKNOWN_CATEGORY)
            .to_string();

        let top_keywords = Self::cluster_keywords(
            records,
            self.config.cluster_keyword_sample,
            self.config.cluster_top_keywords,
        );
        let keywords_label = if top_keywords.is_empty() {
            format!("Cluster {}", cluster_id)
        } else {
            top_keywords
                .iter()
                .take(self.config.cluster_label_keywords)
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        };

        ClusterAggregate {
            cluster_id: cluster_id.to_string(),
            count,
            avg_intensity,
            avg_score,
            dominant_sentiment,
            dominant_category,
            impact_score: count as f64 * avg_intensity,
            group_type: Self::classify(cluster_id, avg_score, self.config.risk_score_threshold),
            top_keywords,
            keywords_label,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
