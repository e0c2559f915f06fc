//! Top-level analysis pipeline.
//!
//! Loads a dataset directory, normalizes its records once and returns an
//! [`AnalysisResult`] whose snapshot every view reads from.

use std::path::Path;

use chrono::Utc;
use insight_core::calculations::mean;
use insight_core::error::Result;
use insight_core::thresholds::AnalyticsConfig;
use insight_core::time_utils::TimezoneHandler;
use serde::Serialize;
use tracing::info;

use crate::deep_dive::DeepDiveOverlay;
use crate::diagnosis::ActionReports;
use crate::normalizer::{DatasetSnapshot, RecordNormalizer};
use crate::reader::load_dataset;
use crate::versions::VersionScoreTable;

// ── Public types ──────────────────────────────────────────────────────────────

/// Metadata produced alongside the analysis result.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisMetadata {
    /// RFC 3339 timestamp when this result was generated.
    pub generated_at: String,
    pub dataset_dir: String,
    /// Main records file that was loaded.
    pub source: String,
    /// Raw rows read from the source.
    pub rows_read: usize,
    /// Records kept after normalization.
    pub records: usize,
    /// Rows removed by normalization.
    pub rows_dropped: usize,
    /// Column topics were taken from, if any.
    pub topic_column: Option<String>,
    pub load_time_seconds: f64,
    pub normalize_time_seconds: f64,
}

/// Headline numbers over reviews that carry a timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OverviewKpis {
    pub total_reviews: usize,
    pub avg_score: Option<f64>,
    /// Mean of Positive=100, Neutral=50, Negative=0.
    pub avg_sentiment_score: Option<f64>,
}

/// Compute [`OverviewKpis`] for `snapshot`.
pub fn overview_kpis(snapshot: &DatasetSnapshot) -> OverviewKpis {
    OverviewKpis {
        total_reviews: snapshot.timed_records().count(),
        avg_score: mean(
            snapshot
                .timed_records()
                .filter_map(|r| r.score)
                .map(f64::from),
        ),
        avg_sentiment_score: mean(
            snapshot
                .timed_records()
                .map(|r| r.sentiment_label.numeric_score()),
        ),
    }
}

/// The complete output of [`analyze_dataset`].
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub snapshot: DatasetSnapshot,
    pub version_scores: VersionScoreTable,
    pub deep_dive: DeepDiveOverlay,
    pub action_items: Option<String>,
    pub reports: ActionReports,
    pub metadata: AnalysisMetadata,
}

impl AnalysisResult {
    pub fn overview(&self) -> OverviewKpis {
        overview_kpis(&self.snapshot)
    }
}

// ── Public function ───────────────────────────────────────────────────────────

/// Run the pipeline for one dataset directory.
///
/// 1. Resolve and read the main records plus optional artifacts.
/// 2. Normalize the records into a [`DatasetSnapshot`].
/// 3. Return an [`AnalysisResult`] with load metadata.
pub fn analyze_dataset(
    dataset_dir: &Path,
    config: &AnalyticsConfig,
    tz: TimezoneHandler,
) -> Result<AnalysisResult> {
    // ── Step 1: Load artifacts ────────────────────────────────────────────────
    let load_start = std::time::Instant::now();
    let artifacts = load_dataset(dataset_dir)?;
    let load_time = load_start.elapsed().as_secs_f64();

    // ── Step 2: Normalize ─────────────────────────────────────────────────────
    let normalize_start = std::time::Instant::now();
    let snapshot = RecordNormalizer::new(config, tz).normalize(&artifacts.raw_records);
    let normalize_time = normalize_start.elapsed().as_secs_f64();

    info!(
        "Normalized {} of {} rows from {}",
        snapshot.len(),
        artifacts.raw_records.len(),
        artifacts.source.display()
    );

    // ── Step 3: Build result ──────────────────────────────────────────────────
    let metadata = AnalysisMetadata {
        generated_at: Utc::now().to_rfc3339(),
        dataset_dir: artifacts.dataset_dir.display().to_string(),
        source: artifacts.source.display().to_string(),
        rows_read: artifacts.raw_records.len(),
        records: snapshot.len(),
        rows_dropped: snapshot.dropped(),
        topic_column: snapshot.topic_column().map(str::to_string),
        load_time_seconds: load_time,
        normalize_time_seconds: normalize_time,
    };

    Ok(AnalysisResult {
        snapshot,
        version_scores: artifacts.version_scores,
        deep_dive: artifacts.deep_dive,
        action_items: artifacts.action_items,
        reports: artifacts.reports,
        metadata,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
