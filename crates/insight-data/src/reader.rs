//! Dataset directory discovery and artifact loading.
//!
//! A data directory holds one subdirectory per analysis run, named by date
//! (`data/2025-06-01/`). Each run contains the main review records plus
//! optional per-version and action artifacts. Tabular artifacts are CSV with
//! a header line; JSON and JSON Lines are accepted as well.

use std::collections::HashMap;
use std::io::{BufRead, Read};
use std::path::{Path, PathBuf};

use insight_core::data_processors::resolve_first;
use insight_core::error::{InsightError, Result};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::deep_dive::DeepDiveOverlay;
use crate::diagnosis::{parse_diagnosis, parse_growth, ActionReports};
use crate::versions::VersionScoreTable;

/// Main record sources, most refined first.
pub const MAIN_SOURCES: &[&str] = &["analyzed_refined", "clustered", "analyzed", "preprocessed"];

/// Extensions tried for each main source, in order.
pub const SOURCE_EXTENSIONS: &[&str] = &["csv", "jsonl", "json"];

/// Upstream per-version scores, in precedence order.
pub const VERSION_TREND_FILES: &[&str] = &["version_trend.csv", "version_trend.json"];
pub const DEEP_DIVE_FILE: &str = "version_trend_deep_dive.json";
pub const ACTION_ITEMS_FILE: &str = "action_items.md";
pub const DIAGNOSIS_FILE: &str = "diagnosis_report.csv";
pub const GROWTH_FILE: &str = "growth_strategy_report_growth.csv";

// ── Discovery ─────────────────────────────────────────────────────────────────

/// Dataset subdirectories of `data_dir`, newest (lexically greatest) first.
pub fn list_dataset_dirs(data_dir: &Path) -> Result<Vec<PathBuf>> {
    if !data_dir.is_dir() {
        return Err(InsightError::DataPathNotFound(data_dir.to_path_buf()));
    }

    let mut dirs: Vec<PathBuf> = walkdir::WalkDir::new(data_dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| entry.into_path())
        .collect();

    dirs.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
    Ok(dirs)
}

/// Pick the dataset directory: `date` when given, otherwise the newest run.
pub fn resolve_dataset_dir(data_dir: &Path, date: Option<&str>) -> Result<PathBuf> {
    if let Some(date) = date {
        let dir = data_dir.join(date);
        return if dir.is_dir() {
            Ok(dir)
        } else {
            Err(InsightError::DataPathNotFound(dir))
        };
    }

    list_dataset_dirs(data_dir)?
        .into_iter()
        .next()
        .ok_or_else(|| InsightError::NoDataSource(data_dir.to_path_buf()))
}

/// The highest-priority main records file present in `dataset_dir`.
pub fn resolve_main_source(dataset_dir: &Path) -> Result<PathBuf> {
    let candidates: Vec<String> = MAIN_SOURCES
        .iter()
        .flat_map(|stem| SOURCE_EXTENSIONS.iter().map(move |ext| format!("{}.{}", stem, ext)))
        .collect();
    let candidates: Vec<&str> = candidates.iter().map(String::as_str).collect();

    resolve_first(&candidates, |name| dataset_dir.join(name).is_file())
        .map(|name| dataset_dir.join(name))
        .ok_or_else(|| InsightError::NoDataSource(dataset_dir.to_path_buf()))
}

// ── Loading ───────────────────────────────────────────────────────────────────

fn open_file(path: &Path) -> Result<std::fs::File> {
    std::fs::File::open(path).map_err(|source| InsightError::FileRead {
        path: path.to_path_buf(),
        source,
    })
}

/// Read raw rows from a `.csv` file (header line, one review per row), a
/// `.jsonl` file (one object per line) or a `.json` file (an array, or an
/// object with a `records` array).
pub fn load_raw_records(path: &Path) -> Result<Vec<Value>> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("csv") => return read_csv_records(path),
        Some("jsonl") => return read_jsonl(path),
        _ => {}
    }

    match load_json_file(path)? {
        Value::Array(rows) => Ok(rows),
        Value::Object(mut obj) => match obj.remove("records") {
            Some(Value::Array(rows)) => Ok(rows),
            _ => Err(InsightError::Config(format!(
                "{} is neither an array nor an object with a \"records\" array",
                path.display()
            ))),
        },
        _ => Err(InsightError::Config(format!(
            "{} does not contain review records",
            path.display()
        ))),
    }
}

/// Deserialize every row of CSV `source`. Rows that fail to decode are
/// logged and skipped; an unreadable header or an I/O failure is an error.
pub(crate) fn csv_rows<T, R>(source: R, origin: &Path) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    R: Read,
{
    let csv_error = |e: csv::Error| InsightError::CsvParse {
        path: origin.to_path_buf(),
        message: e.to_string(),
    };

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(source);
    reader.headers().map_err(csv_error)?;

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for (row_no, result) in reader.deserialize::<T>().enumerate() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) if e.is_io_error() => return Err(csv_error(e)),
            Err(e) => {
                skipped += 1;
                warn!("Skipping row {} of {}: {}", row_no + 1, origin.display(), e);
            }
        }
    }

    debug!(
        "Read {} rows from {} ({} malformed)",
        rows.len(),
        origin.display(),
        skipped
    );
    Ok(rows)
}

/// Read a CSV file into JSON objects keyed by header. Blank cells become
/// `null` so that they read as missing values.
fn read_csv_records(path: &Path) -> Result<Vec<Value>> {
    let rows: Vec<HashMap<String, String>> = csv_rows(open_file(path)?, path)?;
    Ok(rows
        .into_iter()
        .map(|row| {
            let object: Map<String, Value> = row
                .into_iter()
                .map(|(column, cell)| {
                    let value = if cell.trim().is_empty() {
                        Value::Null
                    } else {
                        Value::String(cell)
                    };
                    (column, value)
                })
                .collect();
            Value::Object(object)
        })
        .collect())
}

fn read_jsonl(path: &Path) -> Result<Vec<Value>> {
    let file = open_file(path)?;

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for (line_no, line) in std::io::BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| InsightError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str(trimmed) {
            Ok(value) => rows.push(value),
            Err(e) => {
                skipped += 1;
                warn!("Skipping line {} of {}: {}", line_no + 1, path.display(), e);
            }
        }
    }

    debug!(
        "Read {} rows from {} ({} malformed)",
        rows.len(),
        path.display(),
        skipped
    );
    Ok(rows)
}

/// Parse a whole JSON document.
pub fn load_json_file(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path).map_err(|source| InsightError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&text)?)
}

/// Load an optional JSON artifact. Missing or unreadable files yield `None`.
fn load_optional(path: &Path) -> Option<Value> {
    if !path.is_file() {
        debug!("Optional artifact {} not present", path.display());
        return None;
    }
    match load_json_file(path) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring {}: {}", path.display(), e);
            None
        }
    }
}

/// Upstream per-version scores from `version_trend.csv` (or `.json`), if
/// present. Unreadable files are logged and ignored.
pub fn load_version_scores(dataset_dir: &Path) -> VersionScoreTable {
    let Some(name) = resolve_first(VERSION_TREND_FILES, |name| dataset_dir.join(name).is_file())
    else {
        debug!("No version trend artifact in {}", dataset_dir.display());
        return VersionScoreTable::default();
    };
    let path = dataset_dir.join(name);

    match load_raw_records(&path) {
        Ok(rows) => VersionScoreTable::from_rows(&rows),
        Err(e) => {
            warn!("Ignoring {}: {}", path.display(), e);
            VersionScoreTable::default()
        }
    }
}

/// Parse an optional CSV report with `parse`. Missing or unreadable files
/// yield an empty list.
fn load_optional_report<T>(
    path: &Path,
    parse: impl FnOnce(std::fs::File, &Path) -> Result<Vec<T>>,
) -> Vec<T> {
    if !path.is_file() {
        debug!("Optional artifact {} not present", path.display());
        return Vec::new();
    }
    match open_file(path).and_then(|file| parse(file, path)) {
        Ok(items) => items,
        Err(e) => {
            warn!("Ignoring {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

/// Diagnosis and growth-strategy reports, if present.
pub fn load_action_reports(dataset_dir: &Path) -> ActionReports {
    ActionReports {
        diagnosis: load_optional_report(&dataset_dir.join(DIAGNOSIS_FILE), parse_diagnosis),
        growth: load_optional_report(&dataset_dir.join(GROWTH_FILE), parse_growth),
    }
}

/// Deep-dive overlay from `version_trend_deep_dive.json`, if present.
pub fn load_deep_dive(dataset_dir: &Path) -> DeepDiveOverlay {
    load_optional(&dataset_dir.join(DEEP_DIVE_FILE))
        .map(|value| DeepDiveOverlay::from_value(&value))
        .unwrap_or_default()
}

/// Every artifact of one analysis run.
#[derive(Debug, Clone)]
pub struct DatasetArtifacts {
    pub dataset_dir: PathBuf,
    pub source: PathBuf,
    pub raw_records: Vec<Value>,
    pub version_scores: VersionScoreTable,
    pub deep_dive: DeepDiveOverlay,
    /// Upstream action-item notes (Markdown), shown verbatim.
    pub action_items: Option<String>,
    pub reports: ActionReports,
}

/// Load the main records and every optional artifact of `dataset_dir`.
pub fn load_dataset(dataset_dir: &Path) -> Result<DatasetArtifacts> {
    let source = resolve_main_source(dataset_dir)?;
    info!("Loading review records from {}", source.display());
    let raw_records = load_raw_records(&source)?;

    let action_path = dataset_dir.join(ACTION_ITEMS_FILE);
    let action_items = std::fs::read_to_string(&action_path).ok();

    Ok(DatasetArtifacts {
        dataset_dir: dataset_dir.to_path_buf(),
        source,
        raw_records,
        version_scores: load_version_scores(dataset_dir),
        deep_dive: load_deep_dive(dataset_dir),
        action_items,
        reports: load_action_reports(dataset_dir),
    })
}

// ── Tests ──────────────────────────────────────────────────────────────────────
