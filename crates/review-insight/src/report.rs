//! Text rendering of every report view. JSON output serializes the same
//! values directly.

use std::io::{self, Write};

use insight_core::formatting::{format_count, format_delta, format_number, format_ratio, truncate_text};
use insight_core::models::{ReviewRecord, SentimentLabel};
use insight_data::aggregator::{ClusterAggregate, ClusterPartition};
use insight_data::analysis::{AnalysisMetadata, OverviewKpis};
use insight_data::breakdown::SentimentKeywords;
use insight_data::deep_dive::{DeepDiveItem, DeepDiveOverlay, VersionDeepDive};
use insight_data::diagnosis::{DiagnosisItem, DiagnosisView, GrowthItem, ReportHeadlines};
use insight_data::explorer::ExplorerSummary;
use insight_data::hierarchy::TopicHierarchy;
use insight_data::impact::ImpactOutcome;
use insight_data::trends::{SentimentCounts, SentimentTrend};
use insight_data::versions::{SentimentBridge, VersionAggregate};
use serde::Serialize;

const CONTENT_PREVIEW_CHARS: usize = 60;
const QUOTES_SHOWN: usize = 3;

// ── Report values ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct OverviewReport<'a> {
    pub metadata: &'a AnalysisMetadata,
    pub kpis: OverviewKpis,
    pub sentiment: SentimentCounts,
    pub headlines: ReportHeadlines<'a>,
    pub action_items: Option<&'a str>,
}

/// Per-version release card: the version's row plus its deep-dive entry.
#[derive(Debug, Serialize)]
pub struct VersionCard<'a> {
    pub version: &'a VersionAggregate,
    pub deep_dive: Option<&'a VersionDeepDive>,
}

#[derive(Debug, Serialize)]
pub struct VersionsReport<'a> {
    pub versions: &'a [VersionAggregate],
    pub bridge: Option<SentimentBridge>,
    /// Newest version first.
    pub cards: Vec<VersionCard<'a>>,
}

impl<'a> VersionsReport<'a> {
    pub fn new(
        versions: &'a [VersionAggregate],
        bridge: Option<SentimentBridge>,
        overlay: &'a DeepDiveOverlay,
    ) -> Self {
        let cards = versions
            .iter()
            .rev()
            .map(|version| VersionCard {
                version,
                deep_dive: overlay.lookup(&version.version),
            })
            .collect();
        Self {
            versions,
            bridge,
            cards,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExplorerReport<'a> {
    pub summary: &'a ExplorerSummary,
    pub records: &'a [ReviewRecord],
}

fn opt_number(value: Option<f64>, decimals: u32) -> String {
    value.map_or_else(|| "-".to_string(), |v| format_number(v, decimals))
}

// ── Renderers ─────────────────────────────────────────────────────────────────

pub fn render_overview(out: &mut impl Write, report: &OverviewReport<'_>) -> io::Result<()> {
    let meta = report.metadata;
    writeln!(out, "Dataset: {}", meta.dataset_dir)?;
    writeln!(
        out,
        "Source:  {} ({} rows, {} kept)",
        meta.source,
        format_count(meta.rows_read),
        format_count(meta.records)
    )?;
    writeln!(out)?;
    writeln!(out, "Total reviews:       {}", format_count(report.kpis.total_reviews))?;
    writeln!(out, "Average score:       {}", opt_number(report.kpis.avg_score, 2))?;
    writeln!(
        out,
        "Avg sentiment score: {}",
        opt_number(report.kpis.avg_sentiment_score, 1)
    )?;
    writeln!(out)?;
    for label in SentimentLabel::ALL {
        writeln!(
            out,
            "  {:<9} {:>8}",
            label.as_str(),
            format_count(report.sentiment.get(label))
        )?;
    }

    writeln!(out)?;
    writeln!(out, "Urgent issues (Defect)")?;
    if report.headlines.defects.is_empty() {
        writeln!(out, "  No major issues found.")?;
    }
    for d in report.headlines.defects {
        writeln!(out, "  {} (urgency {})", d.issue_title, opt_number(d.urgency_score, 1))?;
        if let Some(summary) = &d.diagnosis_summary {
            writeln!(out, "    Diagnosis: {}", summary)?;
        }
        if let Some(fix) = &d.technical_recommendation {
            writeln!(out, "    Fix: {}", fix)?;
        }
    }

    writeln!(out)?;
    writeln!(out, "Growth opportunities")?;
    if report.headlines.growth.is_empty() {
        writeln!(out, "  No growth report.")?;
    }
    for g in report.headlines.growth {
        writeln!(out, "  {} (potential {})", g.core_appeal, opt_number(g.potential_score, 1))?;
        if let Some(strategy) = &g.growth_strategy {
            writeln!(out, "    Strategy: {}", strategy)?;
        }
    }

    if let Some(notes) = report.action_items {
        writeln!(out)?;
        writeln!(out, "Action items")?;
        writeln!(out, "{}", notes.trim_end())?;
    }
    Ok(())
}

fn render_cluster_group(
    out: &mut impl Write,
    title: &str,
    clusters: &[ClusterAggregate],
) -> io::Result<()> {
    writeln!(out, "{}", title)?;
    if clusters.is_empty() {
        writeln!(out, "  (none)")?;
        return Ok(());
    }
    writeln!(
        out,
        "  {:<8} {:>6} {:>9} {:>7} {:>9}  {}",
        "cluster", "count", "intensity", "score", "impact", "keywords"
    )?;
    for c in clusters {
        writeln!(
            out,
            "  {:<8} {:>6} {:>9} {:>7} {:>9}  {} [{}]",
            c.cluster_id,
            c.count,
            format_number(c.avg_intensity, 2),
            opt_number(c.avg_score, 2),
            format_number(c.impact_score, 1),
            c.keywords_label,
            c.dominant_category
        )?;
    }
    Ok(())
}

pub fn render_clusters(out: &mut impl Write, partition: &ClusterPartition) -> io::Result<()> {
    render_cluster_group(out, "Negative (Risk)", &partition.risks)?;
    writeln!(out)?;
    render_cluster_group(out, "Positive (Strength)", &partition.strengths)
}

pub fn render_topics(out: &mut impl Write, tree: &TopicHierarchy) -> io::Result<()> {
    writeln!(out, "{} topics", tree.sentiment)?;
    if tree.is_empty() {
        writeln!(out, "  (no topic/keyword pair is frequent enough)")?;
    }
    for topic in &tree.topics {
        writeln!(out, "{} ({})", topic.topic, topic.total)?;
        for leaf in &topic.keywords {
            writeln!(out, "  └ {:<20} {:>6}", leaf.keyword, leaf.count)?;
        }
    }
    Ok(())
}

pub fn render_keywords(out: &mut impl Write, breakdown: &[SentimentKeywords]) -> io::Result<()> {
    for (i, group) in breakdown.iter().enumerate() {
        if i > 0 {
            writeln!(out)?;
        }
        writeln!(out, "{} ({} mentions)", group.sentiment, format_count(group.mentions))?;
        for (rank, kw) in group.keywords.iter().enumerate() {
            writeln!(out, "  {:>2}. {:<20} {:>6}", rank + 1, kw.keyword, kw.count)?;
        }
    }
    Ok(())
}

fn trend_header(out: &mut impl Write, first: &str) -> io::Result<()> {
    writeln!(
        out,
        "  {:<12} {:>8} {:>8} {:>8} {:>9}",
        first, "negative", "neutral", "positive", "sentiment"
    )
}

pub fn render_trend(out: &mut impl Write, trend: &SentimentTrend) -> io::Result<()> {
    writeln!(out, "Daily")?;
    trend_header(out, "date")?;
    for day in &trend.daily {
        writeln!(
            out,
            "  {:<12} {:>8} {:>8} {:>8} {:>9}",
            day.date.format("%Y-%m-%d").to_string(),
            day.counts.negative,
            day.counts.neutral,
            day.counts.positive,
            opt_number(day.avg_sentiment_score, 1)
        )?;
    }

    writeln!(out)?;
    writeln!(out, "By version")?;
    trend_header(out, "version")?;
    for v in &trend.by_version {
        writeln!(
            out,
            "  {:<12} {:>8} {:>8} {:>8} {:>9}",
            v.version,
            v.counts.negative,
            v.counts.neutral,
            v.counts.positive,
            opt_number(v.avg_sentiment_score, 1)
        )?;
    }
    Ok(())
}

fn render_deep_dive_items(
    out: &mut impl Write,
    title: &str,
    items: &[DeepDiveItem],
    empty_note: &str,
) -> io::Result<()> {
    writeln!(out, "  {}", title)?;
    if items.is_empty() {
        writeln!(out, "    {}", empty_note)?;
        return Ok(());
    }
    for item in items {
        writeln!(
            out,
            "    [{}] {} (count {}, delta {})",
            item.owner,
            item.name,
            opt_number(item.count, 0),
            format_delta(item.delta, 0)
        )?;
        if let Some(summary) = &item.summary {
            writeln!(out, "      {}", summary)?;
        }
        for sentence in &item.sentences {
            writeln!(out, "      \"{}\"", sentence)?;
        }
        if !item.keywords.is_empty() {
            writeln!(out, "      keywords: {}", item.keywords.join(", "))?;
        }
    }
    Ok(())
}

fn render_version_card(out: &mut impl Write, card: &VersionCard<'_>) -> io::Result<()> {
    let v = card.version;
    writeln!(
        out,
        "── {} ── defect {} ({})  growth {} ({})  volume {} ({})",
        v.version,
        opt_number(v.defect_score, 2),
        format_delta(v.delta_defect, 2),
        opt_number(v.growth_score, 2),
        format_delta(v.delta_growth, 2),
        format_count(v.review_count),
        format_delta(v.delta_volume.map(|d| d as f64), 0)
    )?;
    match card.deep_dive {
        Some(deep_dive) => {
            render_deep_dive_items(out, "Defects", &deep_dive.defects, "No significant defects.")?;
            render_deep_dive_items(out, "Appeals", &deep_dive.appeals, "No clear appeals.")?;
        }
        None => writeln!(out, "  No deep dive for this version.")?,
    }
    Ok(())
}

pub fn render_versions(out: &mut impl Write, report: &VersionsReport<'_>) -> io::Result<()> {
    if report.versions.is_empty() {
        writeln!(out, "No version has enough reviews to compare.")?;
        return Ok(());
    }
    writeln!(
        out,
        "{:<12} {:>7} {:>9} {:>7} {:>7} {:>7} {:>9} {:>7} {:>7}  {}",
        "version",
        "reviews",
        "positive",
        "defect",
        "growth",
        "Δvol",
        "Δsent",
        "Δdef",
        "Δgrow",
        "quadrant"
    )?;
    for v in report.versions {
        writeln!(
            out,
            "{:<12} {:>7} {:>9} {:>7} {:>7} {:>7} {:>9} {:>7} {:>7}  {}",
            v.version,
            v.review_count,
            format_ratio(v.sentiment_score, 1),
            opt_number(v.defect_score, 2),
            opt_number(v.growth_score, 2),
            format_delta(v.delta_volume.map(|d| d as f64), 0),
            format_delta(v.delta_sentiment.map(|d| d * 100.0), 1),
            format_delta(v.delta_defect, 2),
            format_delta(v.delta_growth, 2),
            v.quadrant().map_or("-", |q| q.as_str())
        )?;
    }

    if let Some(bridge) = &report.bridge {
        writeln!(out)?;
        writeln!(
            out,
            "Sentiment bridge for {}: {} {} → {}",
            bridge.version,
            bridge.previous.map_or_else(|| "-".to_string(), |p| format_ratio(p, 1)),
            format_delta(bridge.delta.map(|d| d * 100.0), 1),
            format_ratio(bridge.current, 1)
        )?;
    }

    if !report.cards.is_empty() {
        writeln!(out)?;
        writeln!(out, "Release deep dive")?;
        for card in &report.cards {
            render_version_card(out, card)?;
        }
    }
    Ok(())
}

pub fn render_impact(out: &mut impl Write, outcome: &ImpactOutcome) -> io::Result<()> {
    let report = match outcome {
        ImpactOutcome::InsufficientData {
            before_count,
            after_count,
        } => {
            writeln!(
                out,
                "Not enough scored reviews around the cutover ({} before, {} after).",
                before_count, after_count
            )?;
            return Ok(());
        }
        ImpactOutcome::Computed(report) => report,
    };

    let s = &report.summary;
    writeln!(out, "Cutover: {}", report.cutover.to_rfc3339())?;
    writeln!(
        out,
        "Before: {} reviews, avg {}   After: {} reviews, avg {}",
        format_count(s.before_count),
        opt_number(s.before_avg_score, 2),
        format_count(s.after_count),
        opt_number(s.after_avg_score, 2)
    )?;

    if !report.changes.is_empty() {
        writeln!(out)?;
        writeln!(
            out,
            "{:<32} {:>6} {:>6} {:>7} {:>7} {:>7}",
            "change", "before", "after", "avg b.", "avg a.", "score"
        )?;
        for c in &report.changes {
            writeln!(
                out,
                "{:<32} {:>6} {:>6} {:>7} {:>7} {:>7}",
                truncate_text(&c.change_text, 32),
                c.before_count,
                c.after_count,
                opt_number(c.before_avg_score, 2),
                opt_number(c.after_avg_score, 2),
                format_number(c.impact_score, 2)
            )?;
        }
    }

    writeln!(out)?;
    writeln!(out, "Daily average score")?;
    for day in &report.daily {
        writeln!(
            out,
            "  {} {:>5} ({})",
            day.date.format("%Y-%m-%d"),
            format_number(day.avg_score, 2),
            day.count
        )?;
    }
    Ok(())
}

pub fn render_explorer(out: &mut impl Write, report: &ExplorerReport<'_>) -> io::Result<()> {
    let s = report.summary;
    writeln!(
        out,
        "Matched {} reviews | avg score {} | at risk {} | positive {}",
        format_count(s.matched),
        opt_number(s.avg_score, 2),
        format_count(s.risk_reviews),
        format_ratio(s.positive_ratio, 1)
    )?;

    let scores: Vec<String> = s
        .score_distribution
        .iter()
        .map(|(score, n)| format!("{}★ {}", score, n))
        .collect();
    writeln!(out, "Scores: {}", scores.join("  "))?;
    let intensities: Vec<String> = s
        .intensity_distribution
        .iter()
        .map(|(level, n)| format!("{}: {}", level, n))
        .collect();
    writeln!(out, "Intensity: {}", intensities.join("  "))?;
    let topics: Vec<String> = s
        .top_topics
        .iter()
        .map(|t| format!("{} {}", t.keyword, t.count))
        .collect();
    writeln!(out, "Topics: {}", topics.join(", "))?;

    writeln!(out)?;
    for r in report.records {
        let date = r
            .timestamp
            .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d").to_string());
        writeln!(
            out,
            "{:<10} {} {:<8} {:<8} {}",
            date,
            r.score.map_or_else(|| "-".to_string(), |v| v.to_string()),
            r.app_version.as_deref().unwrap_or("-"),
            r.sentiment_label.as_str(),
            truncate_text(&r.content, CONTENT_PREVIEW_CHARS)
        )?;
    }
    if report.records.len() < s.matched {
        writeln!(out, "… {} more", s.matched - report.records.len())?;
    }
    Ok(())
}

fn render_diagnosis_item(out: &mut impl Write, d: &DiagnosisItem) -> io::Result<()> {
    writeln!(
        out,
        "[{}] {} (urgency {})",
        d.tier.as_str(),
        d.issue_title,
        opt_number(d.urgency_score, 1)
    )?;
    writeln!(
        out,
        "  department {} | severity {} | {} reviews",
        d.target_department.as_deref().unwrap_or("Unknown"),
        d.severity_level.as_deref().unwrap_or("-"),
        format_count(d.review_count)
    )?;
    let sections = [
        ("Diagnosis", &d.diagnosis_summary),
        ("Reproduction", &d.reproduction_steps),
        ("Recommendation", &d.technical_recommendation),
    ];
    for (label, text) in sections {
        if let Some(text) = text {
            writeln!(out, "  {}: {}", label, text)?;
        }
    }
    for quote in d.user_quotes.iter().take(QUOTES_SHOWN) {
        writeln!(out, "  > \"{}\"", quote)?;
    }
    if !d.review_ids.is_empty() {
        writeln!(out, "  evidence: --view explore --review-id {}", d.review_ids.join(" --review-id "))?;
    }
    Ok(())
}

fn render_growth_item(out: &mut impl Write, g: &GrowthItem) -> io::Result<()> {
    let marker = if g.is_standout() { "**" } else { "*" };
    writeln!(
        out,
        "{} {} (potential {})",
        marker,
        g.core_appeal,
        opt_number(g.potential_score, 1)
    )?;
    if let Some(strategy) = &g.growth_strategy {
        writeln!(out, "  Strategy: {}", strategy)?;
    }
    if let Some(feedback) = &g.constructive_feedback {
        writeln!(out, "  Feedback: {}", feedback)?;
    }
    if let Some(quote) = &g.user_quote {
        writeln!(out, "  > {}", quote)?;
    }
    Ok(())
}

pub fn render_diagnosis(out: &mut impl Write, view: &DiagnosisView<'_>) -> io::Result<()> {
    let s = &view.summary;
    writeln!(
        out,
        "Confirmed issues: {} | avg urgency {} | top department {}",
        format_count(s.issues),
        opt_number(s.avg_urgency, 1),
        s.top_department.as_deref().unwrap_or("-")
    )?;
    if !view.departments.is_empty() {
        writeln!(out, "Departments: {}", view.departments.join(", "))?;
    }
    writeln!(out)?;
    if view.issues.is_empty() {
        writeln!(out, "No diagnosed issues.")?;
    }
    for item in &view.issues {
        render_diagnosis_item(out, item)?;
    }

    writeln!(out)?;
    writeln!(out, "Growth opportunities: {}", format_count(view.growth.len()))?;
    for item in &view.growth {
        render_growth_item(out, item)?;
    }
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────
