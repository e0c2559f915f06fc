//! Heuristic tuning constants and the configuration record that carries them.
//!
//! The values reproduce the dashboard's historical behaviour. None of them is
//! derived; they are policy and may be overridden from a JSON file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{InsightError, Result};

// ── Shared constants ──────────────────────────────────────────────────────────

/// Clusters without an `N-`/`P-` prefix and an average score at or below this
/// value are classified as risks.
pub const RISK_SCORE_THRESHOLD: f64 = 3.2;

/// Clusters shown per risk/strength group.
pub const TOP_CLUSTERS_PER_GROUP: usize = 5;

/// Records sampled per cluster when ranking its keywords.
pub const CLUSTER_KEYWORD_SAMPLE: usize = 50;

/// Keywords retained per cluster.
pub const CLUSTER_TOP_KEYWORDS: usize = 10;

/// Keywords joined into a cluster's display label.
pub const CLUSTER_LABEL_KEYWORDS: usize = 3;

/// Keywords shown per sentiment in the keyword breakdown.
pub const TOP_KEYWORDS_PER_SENTIMENT: usize = 10;

/// Topic/keyword pairs with a count at or below this floor are pruned.
pub const HIERARCHY_MIN_COUNT: usize = 2;

/// Versions with a review count at or below this floor are excluded from trends.
pub const MIN_VERSION_SAMPLES: usize = 10;

/// Number of most recent versions shown by default.
pub const DEFAULT_VERSIONS_SHOWN: usize = 10;

/// Weight applied to the relative drop in matching reviews.
pub const COUNT_DECREASE_WEIGHT: f64 = 50.0;

/// Weight applied to the change in average score.
pub const SCORE_CHANGE_WEIGHT: f64 = 10.0;

/// Intensity assumed when the upstream value is missing or non-numeric.
pub const DEFAULT_INTENSITY: f64 = 1.0;

/// Hangul-character ratio at which a review counts as Korean.
pub const HANGUL_RATIO_THRESHOLD: f64 = 0.6;

// ── AnalyticsConfig ───────────────────────────────────────────────────────────

/// All tunable thresholds used by the aggregation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub risk_score_threshold: f64,
    pub top_clusters_per_group: usize,
    pub cluster_keyword_sample: usize,
    pub cluster_top_keywords: usize,
    pub cluster_label_keywords: usize,
    pub top_keywords_per_sentiment: usize,
    pub hierarchy_min_count: usize,
    pub min_version_samples: usize,
    pub count_decrease_weight: f64,
    pub score_change_weight: f64,
    pub default_intensity: f64,
    /// Drop reviews whose Hangul ratio is below this value. Disabled when `None`.
    pub min_hangul_ratio: Option<f64>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            risk_score_threshold: RISK_SCORE_THRESHOLD,
            top_clusters_per_group: TOP_CLUSTERS_PER_GROUP,
            cluster_keyword_sample: CLUSTER_KEYWORD_SAMPLE,
            cluster_top_keywords: CLUSTER_TOP_KEYWORDS,
            cluster_label_keywords: CLUSTER_LABEL_KEYWORDS,
            top_keywords_per_sentiment: TOP_KEYWORDS_PER_SENTIMENT,
            hierarchy_min_count: HIERARCHY_MIN_COUNT,
            min_version_samples: MIN_VERSION_SAMPLES,
            count_decrease_weight: COUNT_DECREASE_WEIGHT,
            score_change_weight: SCORE_CHANGE_WEIGHT,
            default_intensity: DEFAULT_INTENSITY,
            min_hangul_ratio: None,
        }
    }
}

impl AnalyticsConfig {
    /// Load overrides from a JSON file; absent keys keep their defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| InsightError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AnalyticsConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the aggregates meaningless.
    pub fn validate(&self) -> Result<()> {
        let floats = [
            ("risk_score_threshold", self.risk_score_threshold),
            ("count_decrease_weight", self.count_decrease_weight),
            ("score_change_weight", self.score_change_weight),
            ("default_intensity", self.default_intensity),
        ];
        for (name, value) in floats {
            if !value.is_finite() {
                return Err(InsightError::Config(format!("{} must be finite", name)));
            }
        }
        if let Some(ratio) = self.min_hangul_ratio {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(InsightError::Config(format!(
                    "min_hangul_ratio must be within 0..=1, got {}",
                    ratio
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_constants() {
        let config = AnalyticsConfig::default();
        assert_eq!(config.risk_score_threshold, 3.2);
        assert_eq!(config.top_clusters_per_group, 5);
        assert_eq!(config.cluster_keyword_sample, 50);
        assert_eq!(config.hierarchy_min_count, 2);
        assert_eq!(config.min_version_samples, 10);
        assert_eq!(config.count_decrease_weight, 50.0);
        assert_eq!(config.score_change_weight, 10.0);
        assert!(config.min_hangul_ratio.is_none());
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("analytics.json");
        std::fs::write(&path, r#"{"risk_score_threshold": 3.5, "min_hangul_ratio": 0.6}"#)
            .expect("write");

        let config = AnalyticsConfig::load_from(&path).expect("load");
        assert_eq!(config.risk_score_threshold, 3.5);
        assert_eq!(config.min_hangul_ratio, Some(HANGUL_RATIO_THRESHOLD));
        assert_eq!(config.top_clusters_per_group, TOP_CLUSTERS_PER_GROUP);
    }

    #[test]
    fn test_validate_rejects_bad_ratio() {
        let config = AnalyticsConfig {
            min_hangul_ratio: Some(1.5),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(InsightError::Config(_))));
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("analytics.json");
        std::fs::write(&path, "{not json").expect("write");
        assert!(matches!(
            AnalyticsConfig::load_from(&path),
            Err(InsightError::JsonParse(_))
        ));
    }
}
