use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::thresholds::DEFAULT_VERSIONS_SHOWN;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Review analytics for app-store review exports
#[derive(Parser, Debug, Clone)]
#[command(
    name = "review-insight",
    about = "Review analytics for app-store review exports",
    version
)]
pub struct Settings {
    /// Report to produce
    #[arg(long, default_value = "overview", value_parser = ["overview", "clusters", "topics", "keywords", "trend", "versions", "impact", "explore", "diagnosis"])]
    pub view: String,

    /// Root directory holding dated dataset directories
    #[arg(long, env = "REVIEW_INSIGHT_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Dataset directory name under the data directory (newest if omitted)
    #[arg(long)]
    pub date: Option<String>,

    /// Sentiment class for the topic hierarchy
    #[arg(long, default_value = "Negative", value_parser = ["Positive", "Neutral", "Negative"])]
    pub sentiment: String,

    /// Update cutover date or timestamp for the impact view
    #[arg(long)]
    pub cutover: Option<String>,

    /// Text file listing one change description per line
    #[arg(long)]
    pub changes_file: Option<PathBuf>,

    /// Number of most recent versions shown (5-20)
    #[arg(long, default_value_t = DEFAULT_VERSIONS_SHOWN as u32, value_parser = clap::value_parser!(u32).range(5..=20))]
    pub versions_shown: u32,

    /// Output format
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,

    /// Timezone for naive timestamps and dates (auto-detected if not specified)
    #[arg(long, default_value = "auto")]
    pub timezone: String,

    /// Analytics thresholds file (JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Keyword synonym/stop-word table (JSON)
    #[arg(long)]
    pub keyword_table: Option<PathBuf>,

    /// Explorer: case-insensitive text search over content and issue summary
    #[arg(long)]
    pub search: Option<String>,

    /// Explorer: first day included (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<String>,

    /// Explorer: last day included (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<String>,

    /// Explorer: app versions to keep (repeatable)
    #[arg(long = "app-version")]
    pub app_versions: Vec<String>,

    /// Explorer: star scores to keep (repeatable)
    #[arg(long = "score", value_parser = clap::value_parser!(u8).range(1..=5))]
    pub scores: Vec<u8>,

    /// Explorer: topics to keep (repeatable)
    #[arg(long = "topic")]
    pub topics: Vec<String>,

    /// Explorer: churn-risk statuses to keep (repeatable)
    #[arg(long = "risk-status")]
    pub risk_statuses: Vec<String>,

    /// Explorer: review ids to keep (repeatable)
    #[arg(long = "review-id")]
    pub review_ids: Vec<String>,

    /// Diagnosis: responsible department to keep
    #[arg(long)]
    pub department: Option<String>,

    /// Diagnosis: keep issues whose evidence reviews fall in this cluster
    #[arg(long)]
    pub cluster: Option<String>,

    /// Diagnosis: list least urgent issues first
    #[arg(long)]
    pub ascending: bool,

    /// Explorer: minimum intensity
    #[arg(long)]
    pub min_intensity: Option<f64>,

    /// Explorer: maximum intensity
    #[arg(long)]
    pub max_intensity: Option<f64>,

    /// Explorer: number of matching reviews printed
    #[arg(long, default_value = "20")]
    pub limit: usize,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path (daily files under ~/.review-insight/logs when omitted)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.review-insight/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub versions_shown: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl LastUsedParams {
    /// Return the default path to the persisted config file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Return the config path rooted at `base_dir`.
    pub fn config_path_in(base_dir: &std::path::Path) -> PathBuf {
        base_dir.join(".review-insight").join("last_used.json")
    }

    /// Load persisted params from `path`.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &std::path::Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to an explicit path, creating parent directories.
    pub fn save_to(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at an explicit path if it exists.
    pub fn clear_at(path: &std::path::Path) -> Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit CLI
    /// value was provided, resolve `"auto"` values, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Same as [`Settings::load_with_last_used`] with an explicit argument list
    /// and config path.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &std::path::Path,
    ) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            let _ = LastUsedParams::clear_at(config_path);
            return Self::resolve_auto_values(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // CLI always wins. Arg ids are field names, not flag spellings.
        if !is_arg_explicitly_set(&matches, "view") {
            if let Some(v) = last.view {
                settings.view = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "timezone") {
            if let Some(v) = last.timezone {
                settings.timezone = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "sentiment") {
            if let Some(v) = last.sentiment {
                settings.sentiment = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "versions_shown") {
            if let Some(v) = last.versions_shown.filter(|n| (5..=20).contains(n)) {
                settings.versions_shown = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "format") {
            if let Some(v) = last.format {
                settings.format = v;
            }
        }
        if settings.data_dir.is_none() {
            settings.data_dir = last.data_dir;
        }

        settings = Self::resolve_auto_values(settings);

        let params = LastUsedParams::from(&settings);
        let _ = params.save_to(config_path);

        settings
    }

    /// Resolve `"auto"` sentinel values and apply the `--debug` flag.
    fn resolve_auto_values(mut settings: Settings) -> Settings {
        settings.timezone = crate::time_utils::resolve_timezone_name(&settings.timezone);

        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }

        settings
    }

    pub fn wants_json(&self) -> bool {
        self.format == "json"
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            view: Some(s.view.clone()),
            data_dir: s.data_dir.clone(),
            timezone: Some(s.timezone.clone()),
            sentiment: Some(s.sentiment.clone()),
            versions_shown: Some(s.versions_shown),
            format: Some(s.format.clone()),
        }
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
