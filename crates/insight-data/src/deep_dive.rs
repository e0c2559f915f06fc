//! Optional per-version enrichment: curated defect and appeal items.

use std::collections::HashMap;

use insight_core::data_processors::{coerce_f64, parse_list, value_text};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

pub const DEFAULT_OWNER: &str = "TBD";
pub const DEFAULT_DEFECT_NAME: &str = "Issue";
pub const DEFAULT_APPEAL_NAME: &str = "Appeal";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeepDiveItem {
    pub name: String,
    pub owner: String,
    pub count: Option<f64>,
    pub delta: Option<f64>,
    pub summary: Option<String>,
    pub sentences: Vec<String>,
    pub keywords: Vec<String>,
}

impl DeepDiveItem {
    fn from_object(obj: &Map<String, Value>, default_name: &str) -> Self {
        let text = |key: &str| obj.get(key).and_then(value_text);
        Self {
            name: text("name").unwrap_or_else(|| default_name.to_string()),
            owner: text("owner").unwrap_or_else(|| DEFAULT_OWNER.to_string()),
            count: obj.get("count").and_then(coerce_f64),
            delta: obj.get("delta").and_then(coerce_f64),
            summary: text("summary"),
            sentences: parse_list(obj.get("sentences")),
            keywords: parse_list(obj.get("keywords")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VersionDeepDive {
    pub defects: Vec<DeepDiveItem>,
    pub appeals: Vec<DeepDiveItem>,
}

/// Deep-dive entries keyed by version.
#[derive(Debug, Clone, Default)]
pub struct DeepDiveOverlay {
    entries: HashMap<String, VersionDeepDive>,
}

impl DeepDiveOverlay {
    /// Parse `[{version, data: {defects: [...], appeals: [...]}}]`.
    ///
    /// Entries without a version and items that are not objects are skipped;
    /// anything other than an array yields an empty overlay.
    pub fn from_value(value: &Value) -> Self {
        let Some(rows) = value.as_array() else {
            debug!("Deep-dive payload is not an array, ignoring");
            return Self::default();
        };

        let mut entries = HashMap::new();
        for row in rows.iter().filter_map(Value::as_object) {
            let Some(version) = row.get("version").and_then(value_text) else {
                continue;
            };
            let data = row.get("data");
            let items = |key: &str, default_name: &str| -> Vec<DeepDiveItem> {
                data.and_then(|d| d.get(key))
                    .and_then(Value::as_array)
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(Value::as_object)
                            .map(|obj| DeepDiveItem::from_object(obj, default_name))
                            .collect()
                    })
                    .unwrap_or_default()
            };
            entries.insert(
                version,
                VersionDeepDive {
                    defects: items("defects", DEFAULT_DEFECT_NAME),
                    appeals: items("appeals", DEFAULT_APPEAL_NAME),
                },
            );
        }
        Self { entries }
    }

    pub fn lookup(&self, version: &str) -> Option<&VersionDeepDive> {
        self.entries.get(version)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_items_get_defaults_and_bad_items_skipped() {
        let overlay = DeepDiveOverlay::from_value(&json!([
            {
                "version": "1.2.0",
                "data": {
                    "defects": [
                        {"name": "로그인 실패", "owner": "서버팀", "count": 12, "delta": -3,
                         "sentences": ["접속이 안돼요"], "keywords": "['로그인', '서버']"},
                        {"count": "4"},
                        "not an object"
                    ],
                    "appeals": [{"summary": "스토리 호평"}]
                }
            },
            {"data": {"defects": [{"name": "orphan"}]}}
        ]));

        assert_eq!(overlay.len(), 1);
        let entry = overlay.lookup("1.2.0").unwrap();
        assert_eq!(entry.defects.len(), 2);

        let first = &entry.defects[0];
        assert_eq!(first.owner, "서버팀");
        assert_eq!(first.count, Some(12.0));
        assert_eq!(first.delta, Some(-3.0));
        assert_eq!(first.keywords, vec!["로그인", "서버"]);

        let second = &entry.defects[1];
        assert_eq!(second.name, DEFAULT_DEFECT_NAME);
        assert_eq!(second.owner, DEFAULT_OWNER);
        assert_eq!(second.count, Some(4.0));
        assert!(second.sentences.is_empty());

        assert_eq!(entry.appeals[0].name, DEFAULT_APPEAL_NAME);
        assert_eq!(entry.appeals[0].summary.as_deref(), Some("스토리 호평"));
    }

    #[test]
    fn test_missing_version_is_none() {
        let overlay = DeepDiveOverlay::from_value(&json!([{"version": "1.0.0"}]));
        let entry = overlay.lookup("1.0.0").unwrap();
        assert!(entry.defects.is_empty());
        assert!(overlay.lookup("9.9.9").is_none());
    }

    #[test]
    fn test_non_array_payload_is_empty() {
        assert!(DeepDiveOverlay::from_value(&json!({"version": "1"})).is_empty());
    }
}
