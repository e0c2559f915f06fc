mod bootstrap;
mod report;

use std::io::Write;

use anyhow::{bail, Context, Result};
use insight_core::error::InsightError;
use insight_core::keywords::{KeywordConsolidator, KeywordTable};
use insight_core::models::SentimentLabel;
use insight_core::settings::Settings;
use insight_core::thresholds::AnalyticsConfig;
use insight_core::time_utils::TimezoneHandler;
use insight_data::aggregator::ClusterAggregator;
use insight_data::analysis::{analyze_dataset, AnalysisResult};
use insight_data::breakdown::keyword_breakdown;
use insight_data::diagnosis::{diagnosis_view, DiagnosisQuery, OVERVIEW_HEADLINES};
use insight_data::explorer::{explore, ReviewQuery};
use insight_data::hierarchy::build_hierarchy;
use insight_data::impact::{parse_changes, UpdateImpactComparator};
use insight_data::reader::resolve_dataset_dir;
use insight_data::trends::{sentiment_trend, SentimentCounts};
use insight_data::versions::VersionDeltaEngine;
use serde::Serialize;

use crate::report::{ExplorerReport, OverviewReport, VersionsReport};

fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    let _log_guard = bootstrap::setup_logging(&settings.log_level, settings.log_file.as_deref())?;

    tracing::info!("review-insight v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "View: {}, Timezone: {}, Format: {}",
        settings.view,
        settings.timezone,
        settings.format
    );

    let config = match &settings.config {
        Some(path) => AnalyticsConfig::load_from(path)
            .with_context(|| format!("loading analytics config {}", path.display()))?,
        None => AnalyticsConfig::default(),
    };
    let consolidator = match &settings.keyword_table {
        Some(path) => KeywordConsolidator::new(
            KeywordTable::load_from(path)
                .with_context(|| format!("loading keyword table {}", path.display()))?,
        ),
        None => KeywordConsolidator::default(),
    };
    let tz = TimezoneHandler::new(&settings.timezone);

    let Some(data_dir) = bootstrap::discover_data_dir(settings.data_dir.as_deref()) else {
        bail!("No data directory found; pass --data-dir or create ./data");
    };
    let dataset_dir = resolve_dataset_dir(&data_dir, settings.date.as_deref())?;
    let analysis = analyze_dataset(&dataset_dir, &config, tz)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run_view(&mut out, &settings, &analysis, &config, &consolidator, tz)?;
    out.flush()?;
    Ok(())
}

/// Print `value` as pretty JSON, or with `render` as text.
fn emit<T, W, F>(out: &mut W, settings: &Settings, value: &T, render: F) -> Result<()>
where
    T: Serialize,
    W: Write,
    F: FnOnce(&mut W, &T) -> std::io::Result<()>,
{
    if settings.wants_json() {
        serde_json::to_writer_pretty(&mut *out, value)?;
        writeln!(out)?;
    } else {
        render(out, value)?;
    }
    Ok(())
}

fn run_view<W: Write>(
    out: &mut W,
    settings: &Settings,
    analysis: &AnalysisResult,
    config: &AnalyticsConfig,
    consolidator: &KeywordConsolidator,
    tz: TimezoneHandler,
) -> Result<()> {
    let snapshot = &analysis.snapshot;

    match settings.view.as_str() {
        "overview" => {
            let report = OverviewReport {
                metadata: &analysis.metadata,
                kpis: analysis.overview(),
                sentiment: snapshot.records().iter().collect::<SentimentCounts>(),
                headlines: analysis.reports.headlines(OVERVIEW_HEADLINES),
                action_items: analysis.action_items.as_deref(),
            };
            emit(out, settings, &report, |o, r| report::render_overview(o, r))
        }

        "clusters" => {
            let partition = ClusterAggregator::new(config).partition(snapshot);
            emit(out, settings, &partition, |o, p| report::render_clusters(o, p))
        }

        "topics" => {
            let sentiment: SentimentLabel = settings.sentiment.parse()?;
            let tree = build_hierarchy(snapshot, sentiment, config.hierarchy_min_count);
            emit(out, settings, &tree, |o, t| report::render_topics(o, t))
        }

        "keywords" => {
            let breakdown =
                keyword_breakdown(snapshot, consolidator, config.top_keywords_per_sentiment);
            emit(out, settings, &breakdown, |o, b| report::render_keywords(o, b))
        }

        "trend" => {
            let trend = sentiment_trend(snapshot, &tz, config.min_version_samples);
            emit(out, settings, &trend, |o, t| report::render_trend(o, t))
        }

        "versions" => {
            let trend = VersionDeltaEngine::new(config).build(snapshot, &analysis.version_scores);
            let shown = settings.versions_shown as usize;
            let versions = trend.latest(shown);
            let report =
                VersionsReport::new(versions, trend.sentiment_bridge(shown), &analysis.deep_dive);
            emit(out, settings, &report, |o, r| report::render_versions(o, r))
        }

        "impact" => {
            let Some(raw_cutover) = settings.cutover.as_deref() else {
                bail!("--cutover is required for the impact view");
            };
            let cutover = tz
                .parse_timestamp(raw_cutover)
                .ok_or_else(|| InsightError::TimestampParse(raw_cutover.to_string()))?;
            let changes = match &settings.changes_file {
                Some(path) => parse_changes(
                    &std::fs::read_to_string(path)
                        .with_context(|| format!("reading changes file {}", path.display()))?,
                ),
                None => Vec::new(),
            };
            let outcome =
                UpdateImpactComparator::new(config, tz).compare(snapshot, cutover, &changes);
            emit(out, settings, &outcome, |o, r| report::render_impact(o, r))
        }

        "explore" => {
            let query = build_query(settings)?;
            let result = explore(snapshot, &query, &tz);
            let shown = result.records.len().min(settings.limit);
            let report = ExplorerReport {
                summary: &result.summary,
                records: &result.records[..shown],
            };
            emit(out, settings, &report, |o, r| report::render_explorer(o, r))
        }

        "diagnosis" => {
            let mut query = DiagnosisQuery {
                department: settings.department.clone(),
                evidence: None,
                ascending: settings.ascending,
            };
            if let Some(cluster) = settings.cluster.as_deref() {
                query = query.with_cluster(snapshot, cluster);
            }
            let view = diagnosis_view(&analysis.reports, &query);
            emit(out, settings, &view, |o, v| report::render_diagnosis(o, v))
        }

        unknown => bail!("Unknown view: {}", unknown),
    }
}

fn parse_day(flag: &str, value: Option<&str>) -> Result<Option<chrono::NaiveDate>> {
    value
        .map(|v| {
            TimezoneHandler::parse_date(v)
                .ok_or_else(|| anyhow::anyhow!("--{} expects YYYY-MM-DD, got {:?}", flag, v))
        })
        .transpose()
}

fn build_query(settings: &Settings) -> Result<ReviewQuery> {
    Ok(ReviewQuery {
        date_from: parse_day("from", settings.from.as_deref())?,
        date_to: parse_day("to", settings.to.as_deref())?,
        review_ids: settings.review_ids.clone(),
        versions: settings.app_versions.clone(),
        scores: settings.scores.clone(),
        topics: settings.topics.clone(),
        risk_statuses: settings.risk_statuses.clone(),
        intensity_min: settings.min_intensity,
        intensity_max: settings.max_intensity,
        text: settings.search.clone(),
    })
}

// ── Tests ──────────────────────────────────────────────────────────────────────
