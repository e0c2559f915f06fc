//! Before/after comparison of reviews around a release cutover.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use insight_core::calculations::{mean, round_to};
use insight_core::models::ReviewRecord;
use insight_core::thresholds::AnalyticsConfig;
use insight_core::time_utils::TimezoneHandler;
use serde::Serialize;
use tracing::{debug, info};

use crate::normalizer::DatasetSnapshot;

/// Split release-note text into change lines: trimmed, empties dropped.
pub fn parse_changes(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Improvement score of one change.
///
/// The relative drop in matching reviews is weighted by `count_weight` and
/// the rise in average score by `score_weight`. Negative totals clamp to 0;
/// the result is rounded to 2 decimals.
pub fn improvement_score(
    before_count: usize,
    after_count: usize,
    before_avg: Option<f64>,
    after_avg: Option<f64>,
    count_weight: f64,
    score_weight: f64,
) -> f64 {
    let mut score = 0.0;
    if before_count > 0 {
        score += (before_count as f64 - after_count as f64) / before_count as f64 * count_weight;
    }
    if let (Some(before), Some(after)) = (before_avg, after_avg) {
        score += (after - before) * score_weight;
    }
    round_to(score.max(0.0), 2)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeImpact {
    pub change_text: String,
    /// Lower-cased first token of the change line.
    pub keyword: String,
    pub before_count: usize,
    pub after_count: usize,
    pub before_avg_score: Option<f64>,
    pub after_avg_score: Option<f64>,
    pub impact_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactSummary {
    pub before_count: usize,
    pub after_count: usize,
    pub before_avg_score: Option<f64>,
    pub after_avg_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyScore {
    pub date: NaiveDate,
    pub avg_score: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactReport {
    pub cutover: DateTime<Utc>,
    pub summary: ImpactSummary,
    pub changes: Vec<ChangeImpact>,
    pub daily: Vec<DailyScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImpactOutcome {
    /// One side of the cutover has no scored reviews.
    InsufficientData {
        before_count: usize,
        after_count: usize,
    },
    Computed(ImpactReport),
}

// ── UpdateImpactComparator ────────────────────────────────────────────────────

/// A review with both a timestamp and a score.
type Scored<'r> = (&'r ReviewRecord, DateTime<Utc>, f64);

pub struct UpdateImpactComparator<'a> {
    config: &'a AnalyticsConfig,
    tz: TimezoneHandler,
}

impl<'a> UpdateImpactComparator<'a> {
    pub fn new(config: &'a AnalyticsConfig, tz: TimezoneHandler) -> Self {
        Self { config, tz }
    }

    /// Compare reviews before `cutover` with those at or after it, overall
    /// and for each change line.
    pub fn compare(
        &self,
        snapshot: &DatasetSnapshot,
        cutover: DateTime<Utc>,
        changes: &[String],
    ) -> ImpactOutcome {
        let scored: Vec<Scored<'_>> = snapshot
            .records()
            .iter()
            .filter_map(|r| Some((r, r.timestamp?, f64::from(r.score?))))
            .collect();
        let (before, after): (Vec<Scored<'_>>, Vec<Scored<'_>>) =
            scored.iter().copied().partition(|(_, at, _)| *at < cutover);

        if before.is_empty() || after.is_empty() {
            info!(
                "Not enough reviews around cutover {}: {} before, {} after",
                cutover,
                before.len(),
                after.len()
            );
            return ImpactOutcome::InsufficientData {
                before_count: before.len(),
                after_count: after.len(),
            };
        }

        let summary = ImpactSummary {
            before_count: before.len(),
            after_count: after.len(),
            before_avg_score: mean(before.iter().map(|(_, _, s)| *s)),
            after_avg_score: mean(after.iter().map(|(_, _, s)| *s)),
        };

        let changes = changes
            .iter()
            .filter_map(|change| self.change_impact(change, &before, &after))
            .collect();

        ImpactOutcome::Computed(ImpactReport {
            cutover,
            summary,
            changes,
            daily: self.daily_scores(&scored),
        })
    }

    fn change_impact(
        &self,
        change: &str,
        before: &[Scored<'_>],
        after: &[Scored<'_>],
    ) -> Option<ChangeImpact> {
        let keyword = change.split_whitespace().next()?.to_lowercase();
        let matching = |side: &[Scored<'_>]| -> Vec<f64> {
            side.iter()
                .filter(|(r, _, _)| r.content.to_lowercase().contains(&keyword))
                .map(|(_, _, s)| *s)
                .collect()
        };
        let before_scores = matching(before);
        let after_scores = matching(after);
        let before_avg_score = mean(before_scores.iter().copied());
        let after_avg_score = mean(after_scores.iter().copied());

        let impact_score = improvement_score(
            before_scores.len(),
            after_scores.len(),
            before_avg_score,
            after_avg_score,
            self.config.count_decrease_weight,
            self.config.score_change_weight,
        );
        debug!(
            "Change '{}' ({}): {} -> {} reviews, impact {}",
            change,
            keyword,
            before_scores.len(),
            after_scores.len(),
            impact_score
        );

        Some(ChangeImpact {
            change_text: change.to_string(),
            keyword,
            before_count: before_scores.len(),
            after_count: after_scores.len(),
            before_avg_score,
            after_avg_score,
            impact_score,
        })
    }

    fn daily_scores(&self, scored: &[Scored<'_>]) -> Vec<DailyScore> {
        let mut days: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
        for (_, at, score) in scored {
            let day = days.entry(self.tz.local_date(*at)).or_insert((0.0, 0));
            day.0 += score;
            day.1 += 1;
        }
        days.into_iter()
            .map(|(date, (sum, count))| DailyScore {
                date,
                avg_score: sum / count as f64,
                count,
            })
            .collect()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use insight_core::models::SentimentLabel;

    fn review(day: u32, score: Option<u8>, content: &str) -> ReviewRecord {
        let mut r = ReviewRecord::new("r", SentimentLabel::Neutral);
        r.timestamp = Utc.with_ymd_and_hms(2025, 6, day, 12, 0, 0).single();
        r.score = score;
        r.content = content.to_string();
        r
    }

    fn cutover() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_changes_trims_and_drops_empty() {
        let changes = parse_changes("  렉 개선  \n\n\t\n과금 완화\r\n");
        assert_eq!(changes, vec!["렉 개선", "과금 완화"]);
    }

    #[test]
    fn test_improvement_score_formula() {
        assert_eq!(improvement_score(10, 0, None, None, 50.0, 10.0), 50.0);
        assert_eq!(improvement_score(10, 5, Some(2.0), Some(3.0), 50.0, 10.0), 35.0);
        assert_eq!(improvement_score(2, 6, Some(3.0), Some(2.0), 50.0, 10.0), 0.0);
        assert_eq!(improvement_score(0, 4, None, Some(4.0), 50.0, 10.0), 0.0);
        assert_eq!(improvement_score(3, 2, None, None, 50.0, 10.0), 16.67);
    }

    #[test]
    fn test_improvement_score_documented_example() {
        // 60% fewer matching reviews and +2.0 average score.
        assert_eq!(improvement_score(100, 40, Some(2.0), Some(4.0), 50.0, 10.0), 50.0);
    }

    #[test]
    fn test_insufficient_data_when_side_empty() {
        let snap = DatasetSnapshot::from_records(
            vec![review(1, Some(2), "렉"), review(2, Some(3), "렉"), review(20, None, "렉")],
            &["at", "score"],
        );
        let config = AnalyticsConfig::default();
        let outcome = UpdateImpactComparator::new(&config, TimezoneHandler::default())
            .compare(&snap, cutover(), &[]);
        assert_eq!(
            outcome,
            ImpactOutcome::InsufficientData {
                before_count: 2,
                after_count: 0
            }
        );
    }

    #[test]
    fn test_change_keyword_matches_case_insensitively() {
        let mut records: Vec<ReviewRecord> =
            (0..10).map(|_| review(1, Some(1), "Lag everywhere")).collect();
        records.push(review(2, Some(3), "fine"));
        records.push(review(11, Some(5), "all good now"));
        let snap = DatasetSnapshot::from_records(records, &["at", "score", "content"]);

        let config = AnalyticsConfig::default();
        let changes = parse_changes("LAG fixes for low-end devices\nNew costume");
        let ImpactOutcome::Computed(report) =
            UpdateImpactComparator::new(&config, TimezoneHandler::default())
                .compare(&snap, cutover(), &changes)
        else {
            panic!("expected computed report");
        };

        assert_eq!(report.summary.before_count, 11);
        assert_eq!(report.summary.after_count, 1);
        assert_eq!(report.summary.after_avg_score, Some(5.0));

        let lag = &report.changes[0];
        assert_eq!(lag.keyword, "lag");
        assert_eq!(lag.before_count, 10);
        assert_eq!(lag.after_count, 0);
        assert_eq!(lag.before_avg_score, Some(1.0));
        assert_eq!(lag.after_avg_score, None);
        assert_eq!(lag.impact_score, 50.0);

        let costume = &report.changes[1];
        assert_eq!(costume.before_count, 0);
        assert_eq!(costume.impact_score, 0.0);
    }

    #[test]
    fn test_record_at_cutover_counts_as_after() {
        let mut at_cutover = review(10, Some(4), "x");
        at_cutover.timestamp = Some(cutover());
        let snap = DatasetSnapshot::from_records(vec![review(9, Some(2), "x"), at_cutover], &["at"]);
        let config = AnalyticsConfig::default();
        let outcome = UpdateImpactComparator::new(&config, TimezoneHandler::default())
            .compare(&snap, cutover(), &[]);
        let ImpactOutcome::Computed(report) = outcome else {
            panic!("expected computed report");
        };
        assert_eq!(report.summary.before_count, 1);
        assert_eq!(report.summary.after_count, 1);
        assert_eq!(report.daily.len(), 2);
        assert_eq!(report.daily[1].avg_score, 4.0);
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(ImpactOutcome::InsufficientData {
            before_count: 0,
            after_count: 3,
        })
        .unwrap();
        assert_eq!(json["status"], "insufficient_data");
        assert_eq!(json["after_count"], 3);
    }
}
