//! Upstream action reports: defect diagnoses and growth strategies.
//!
//! Both are produced per analysis run as CSV. Diagnoses are filtered by
//! department or cluster and ranked by urgency; growth items by potential.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io::Read;
use std::path::Path;

use insight_core::calculations::mean;
use insight_core::data_processors::parse_list_literal;
use insight_core::error::Result;
use serde::{Deserialize, Serialize};

use crate::normalizer::DatasetSnapshot;
use crate::reader::csv_rows;

/// Urgency at or above which an issue is critical.
pub const CRITICAL_URGENCY: f64 = 80.0;
/// Urgency at or above which an issue is major.
pub const MAJOR_URGENCY: f64 = 50.0;
/// Potential at or above which a growth item stands out.
pub const STANDOUT_POTENTIAL: f64 = 80.0;
/// Items of each report shown on the overview.
pub const OVERVIEW_HEADLINES: usize = 3;

// ── Rows ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct DiagnosisRow {
    #[serde(default)]
    issue_title: Option<String>,
    #[serde(default)]
    diagnosis_summary: Option<String>,
    #[serde(default)]
    technical_recommendation: Option<String>,
    #[serde(default)]
    reproduction_steps: Option<String>,
    #[serde(default)]
    target_department: Option<String>,
    #[serde(default)]
    severity_level: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    urgency_score: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    review_count: Option<f64>,
    #[serde(default)]
    review_ids: Option<String>,
    #[serde(default)]
    user_quotes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GrowthRow {
    #[serde(default)]
    core_appeal: Option<String>,
    #[serde(default)]
    growth_strategy: Option<String>,
    #[serde(default)]
    constructive_feedback: Option<String>,
    #[serde(default)]
    user_quote: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    potential_score: Option<f64>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ── Items ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UrgencyTier {
    Critical,
    Major,
    Minor,
}

impl UrgencyTier {
    /// Missing urgency counts as 0.
    pub fn from_score(score: Option<f64>) -> Self {
        match score.unwrap_or(0.0) {
            s if s >= CRITICAL_URGENCY => UrgencyTier::Critical,
            s if s >= MAJOR_URGENCY => UrgencyTier::Major,
            _ => UrgencyTier::Minor,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UrgencyTier::Critical => "Critical",
            UrgencyTier::Major => "Major",
            UrgencyTier::Minor => "Minor",
        }
    }
}

/// One diagnosed defect issue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosisItem {
    pub issue_title: String,
    pub diagnosis_summary: Option<String>,
    pub technical_recommendation: Option<String>,
    pub reproduction_steps: Option<String>,
    pub target_department: Option<String>,
    pub severity_level: Option<String>,
    pub urgency_score: Option<f64>,
    pub tier: UrgencyTier,
    /// Evidence reviews, matched against record ids.
    pub review_ids: Vec<String>,
    /// Explicit `review_count`, else the number of evidence ids, else 1.
    pub review_count: usize,
    pub user_quotes: Vec<String>,
}

impl From<DiagnosisRow> for DiagnosisItem {
    fn from(row: DiagnosisRow) -> Self {
        let raw_ids = non_blank(row.review_ids);
        let parsed_ids = raw_ids.as_deref().and_then(parse_list_literal);
        let review_count = match (row.review_count, &parsed_ids) {
            (Some(n), _) if n >= 0.0 => n as usize,
            (_, Some(ids)) => ids.len(),
            _ => 1,
        };
        let user_quotes = match non_blank(row.user_quotes) {
            Some(raw) => parse_list_literal(&raw).unwrap_or_else(|| vec![raw]),
            None => Vec::new(),
        };

        Self {
            issue_title: non_blank(row.issue_title).unwrap_or_else(|| "-".to_string()),
            diagnosis_summary: non_blank(row.diagnosis_summary),
            technical_recommendation: non_blank(row.technical_recommendation),
            reproduction_steps: non_blank(row.reproduction_steps),
            target_department: non_blank(row.target_department),
            severity_level: non_blank(row.severity_level),
            urgency_score: row.urgency_score,
            tier: UrgencyTier::from_score(row.urgency_score),
            review_ids: parsed_ids.unwrap_or_default(),
            review_count,
            user_quotes,
        }
    }
}

/// One growth opportunity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthItem {
    pub core_appeal: String,
    pub growth_strategy: Option<String>,
    pub constructive_feedback: Option<String>,
    pub user_quote: Option<String>,
    pub potential_score: Option<f64>,
}

impl GrowthItem {
    pub fn is_standout(&self) -> bool {
        self.potential_score.is_some_and(|p| p >= STANDOUT_POTENTIAL)
    }
}

impl From<GrowthRow> for GrowthItem {
    fn from(row: GrowthRow) -> Self {
        Self {
            core_appeal: non_blank(row.core_appeal).unwrap_or_else(|| "-".to_string()),
            growth_strategy: non_blank(row.growth_strategy),
            constructive_feedback: non_blank(row.constructive_feedback),
            user_quote: non_blank(row.user_quote),
            potential_score: row.potential_score,
        }
    }
}

/// Parse `diagnosis_report.csv` content.
pub fn parse_diagnosis<R: Read>(source: R, origin: &Path) -> Result<Vec<DiagnosisItem>> {
    Ok(csv_rows::<DiagnosisRow, _>(source, origin)?
        .into_iter()
        .map(DiagnosisItem::from)
        .collect())
}

/// Parse `growth_strategy_report_growth.csv` content.
pub fn parse_growth<R: Read>(source: R, origin: &Path) -> Result<Vec<GrowthItem>> {
    Ok(csv_rows::<GrowthRow, _>(source, origin)?
        .into_iter()
        .map(GrowthItem::from)
        .collect())
}

// ── ActionReports ─────────────────────────────────────────────────────────────

/// Both reports in file order.
#[derive(Debug, Clone, Default)]
pub struct ActionReports {
    pub diagnosis: Vec<DiagnosisItem>,
    pub growth: Vec<GrowthItem>,
}

/// Leading items of each report, as listed upstream.
#[derive(Debug, Clone, Serialize)]
pub struct ReportHeadlines<'a> {
    pub defects: &'a [DiagnosisItem],
    pub growth: &'a [GrowthItem],
}

impl ActionReports {
    pub fn is_empty(&self) -> bool {
        self.diagnosis.is_empty() && self.growth.is_empty()
    }

    /// Distinct departments named by the diagnosis report, sorted.
    pub fn departments(&self) -> Vec<&str> {
        let set: BTreeSet<&str> = self
            .diagnosis
            .iter()
            .filter_map(|d| d.target_department.as_deref())
            .collect();
        set.into_iter().collect()
    }

    pub fn headlines(&self, n: usize) -> ReportHeadlines<'_> {
        ReportHeadlines {
            defects: &self.diagnosis[..n.min(self.diagnosis.len())],
            growth: &self.growth[..n.min(self.growth.len())],
        }
    }
}

// ── Diagnosis view ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiagnosisQuery {
    pub department: Option<String>,
    /// Keep only issues citing at least one of these review ids.
    pub evidence: Option<HashSet<String>>,
    /// Least urgent first; missing urgency always sorts last.
    pub ascending: bool,
}

impl DiagnosisQuery {
    /// Restrict to issues whose evidence overlaps the reviews of `cluster_id`.
    pub fn with_cluster(mut self, snapshot: &DatasetSnapshot, cluster_id: &str) -> Self {
        self.evidence = Some(
            snapshot
                .records()
                .iter()
                .filter(|r| r.cluster_id == cluster_id)
                .map(|r| r.id.clone())
                .collect(),
        );
        self
    }

    fn matches(&self, item: &DiagnosisItem) -> bool {
        if let Some(department) = &self.department {
            if item.target_department.as_ref() != Some(department) {
                return false;
            }
        }
        match &self.evidence {
            Some(ids) => item.review_ids.iter().any(|id| ids.contains(id)),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiagnosisSummary {
    pub issues: usize,
    pub avg_urgency: Option<f64>,
    /// Most frequent department; the alphabetically first on ties.
    pub top_department: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosisView<'a> {
    pub summary: DiagnosisSummary,
    pub departments: Vec<&'a str>,
    pub issues: Vec<&'a DiagnosisItem>,
    /// Highest potential first.
    pub growth: Vec<&'a GrowthItem>,
}

fn by_score_missing_last(a: Option<f64>, b: Option<f64>, ascending: bool) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Some(a), Some(b)) => {
            let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
            if ascending {
                ord
            } else {
                ord.reverse()
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn summarize(issues: &[&DiagnosisItem]) -> DiagnosisSummary {
    let mut departments: BTreeMap<&str, usize> = BTreeMap::new();
    for department in issues.iter().filter_map(|d| d.target_department.as_deref()) {
        *departments.entry(department).or_insert(0) += 1;
    }
    let mut top: Option<(&str, usize)> = None;
    for (department, count) in departments {
        if top.map_or(true, |(_, best)| count > best) {
            top = Some((department, count));
        }
    }

    DiagnosisSummary {
        issues: issues.len(),
        avg_urgency: mean(issues.iter().filter_map(|d| d.urgency_score)),
        top_department: top.map(|(d, _)| d.to_string()),
    }
}

/// Filter and rank the diagnosis report and rank the growth report.
pub fn diagnosis_view<'a>(reports: &'a ActionReports, query: &DiagnosisQuery) -> DiagnosisView<'a> {
    let mut issues: Vec<&DiagnosisItem> =
        reports.diagnosis.iter().filter(|d| query.matches(d)).collect();
    issues.sort_by(|a, b| by_score_missing_last(a.urgency_score, b.urgency_score, query.ascending));

    let mut growth: Vec<&GrowthItem> = reports.growth.iter().collect();
    growth.sort_by(|a, b| by_score_missing_last(a.potential_score, b.potential_score, false));

    DiagnosisView {
        summary: summarize(&issues),
        departments: reports.departments(),
        issues,
        growth,
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use insight_core::models::{ReviewRecord, SentimentLabel};

    const DIAGNOSIS_CSV: &str = "\
issue_title,diagnosis_summary,technical_recommendation,target_department,severity_level,urgency_score,review_ids,user_quotes
서버 렉,피크 시간대 지연,서버 증설,Server,High,85,\"[0, 1, 2]\",\"['렉 심해요', '튕겨요']\"
과금 불만,가격 부담,패키지 조정,BM,Medium,40,[3],비싸요
로딩 지연,,,Server,,62.5,,
결제 오류,,,,Low,not-a-number,\"[5]\",
";

    const GROWTH_CSV: &str = "\
core_appeal,growth_strategy,potential_score,user_quote
스토리,시즌 이벤트,70,재밌어요
캐릭터,굿즈 협업,91,
아트,,,
";

    fn reports() -> ActionReports {
        ActionReports {
            diagnosis: parse_diagnosis(DIAGNOSIS_CSV.as_bytes(), Path::new("diagnosis_report.csv"))
                .unwrap(),
            growth: parse_growth(GROWTH_CSV.as_bytes(), Path::new("growth.csv")).unwrap(),
        }
    }

    fn titles(view: &DiagnosisView<'_>) -> Vec<String> {
        view.issues.iter().map(|d| d.issue_title.clone()).collect()
    }

    #[test]
    fn test_parse_diagnosis_rows() {
        let reports = reports();
        assert_eq!(reports.diagnosis.len(), 4);

        let lag = &reports.diagnosis[0];
        assert_eq!(lag.review_ids, vec!["0", "1", "2"]);
        assert_eq!(lag.review_count, 3);
        assert_eq!(lag.user_quotes, vec!["렉 심해요", "튕겨요"]);
        assert_eq!(lag.tier, UrgencyTier::Critical);

        let price = &reports.diagnosis[1];
        assert_eq!(price.user_quotes, vec!["비싸요"]);
        assert_eq!(price.tier, UrgencyTier::Minor);

        let loading = &reports.diagnosis[2];
        assert_eq!(loading.diagnosis_summary, None);
        assert_eq!(loading.review_count, 1);
        assert_eq!(loading.tier, UrgencyTier::Major);

        assert_eq!(reports.diagnosis[3].urgency_score, None);
        assert_eq!(reports.diagnosis[3].target_department, None);
    }

    #[test]
    fn test_view_sorts_by_urgency_with_missing_last() {
        let reports = reports();
        let view = diagnosis_view(&reports, &DiagnosisQuery::default());
        assert_eq!(titles(&view), vec!["서버 렉", "로딩 지연", "과금 불만", "결제 오류"]);

        let query = DiagnosisQuery {
            ascending: true,
            ..Default::default()
        };
        let view = diagnosis_view(&reports, &query);
        assert_eq!(titles(&view), vec!["과금 불만", "로딩 지연", "서버 렉", "결제 오류"]);
    }

    #[test]
    fn test_summary_and_department_filter() {
        let reports = reports();
        let view = diagnosis_view(&reports, &DiagnosisQuery::default());
        assert_eq!(view.summary.issues, 4);
        assert_eq!(view.summary.avg_urgency, Some((85.0 + 40.0 + 62.5) / 3.0));
        assert_eq!(view.summary.top_department.as_deref(), Some("Server"));
        assert_eq!(view.departments, vec!["BM", "Server"]);

        let query = DiagnosisQuery {
            department: Some("BM".to_string()),
            ..Default::default()
        };
        let view = diagnosis_view(&reports, &query);
        assert_eq!(titles(&view), vec!["과금 불만"]);
        assert_eq!(view.summary.avg_urgency, Some(40.0));
        assert_eq!(view.summary.top_department.as_deref(), Some("BM"));
    }

    #[test]
    fn test_top_department_tie_is_alphabetical() {
        let issues = [
            DiagnosisItem::from(DiagnosisRow {
                target_department: Some("Server".to_string()),
                ..row()
            }),
            DiagnosisItem::from(DiagnosisRow {
                target_department: Some("Client".to_string()),
                ..row()
            }),
        ];
        let refs: Vec<&DiagnosisItem> = issues.iter().collect();
        assert_eq!(summarize(&refs).top_department.as_deref(), Some("Client"));
        assert_eq!(summarize(&[]).avg_urgency, None);
    }

    fn row() -> DiagnosisRow {
        DiagnosisRow {
            issue_title: None,
            diagnosis_summary: None,
            technical_recommendation: None,
            reproduction_steps: None,
            target_department: None,
            severity_level: None,
            urgency_score: None,
            review_count: None,
            review_ids: None,
            user_quotes: None,
        }
    }

    #[test]
    fn test_cluster_filter_uses_evidence_overlap() {
        let mut records = Vec::new();
        for (id, cluster) in [("0", "N-1"), ("1", "N-1"), ("3", "N-2"), ("4", "N-2")] {
            let mut r = ReviewRecord::new(id, SentimentLabel::Negative);
            r.cluster_id = cluster.to_string();
            records.push(r);
        }
        let snapshot = DatasetSnapshot::from_records(records, &["cluster"]);

        let reports = reports();
        let query = DiagnosisQuery::default().with_cluster(&snapshot, "N-2");
        assert_eq!(titles(&diagnosis_view(&reports, &query)), vec!["과금 불만"]);

        let query = DiagnosisQuery::default().with_cluster(&snapshot, "P-9");
        assert!(diagnosis_view(&reports, &query).issues.is_empty());
    }

    #[test]
    fn test_growth_ranked_by_potential() {
        let reports = reports();
        let view = diagnosis_view(&reports, &DiagnosisQuery::default());
        let appeals: Vec<&str> = view.growth.iter().map(|g| g.core_appeal.as_str()).collect();
        assert_eq!(appeals, vec!["캐릭터", "스토리", "아트"]);
        assert!(view.growth[0].is_standout());
        assert!(!view.growth[1].is_standout());
        assert_eq!(view.growth[1].user_quote.as_deref(), Some("재밌어요"));
    }

    #[test]
    fn test_headlines_keep_file_order() {
        let reports = reports();
        let headlines = reports.headlines(OVERVIEW_HEADLINES);
        assert_eq!(headlines.defects.len(), 3);
        assert_eq!(headlines.defects[1].issue_title, "과금 불만");
        assert_eq!(headlines.growth[0].core_appeal, "스토리");
        assert!(ActionReports::default().headlines(3).defects.is_empty());
    }
}
