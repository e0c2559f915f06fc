//! Keyword synonym consolidation and stop-list filtering.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{InsightError, Result};

/// Built-in surface-variant → canonical-label pairs.
const DEFAULT_SYNONYMS: &[(&str, &str)] = &[
    ("재미있는", "재미"),
    ("재밌는", "재미"),
    ("꿀잼", "재미"),
    ("존잼", "재미"),
    ("잼", "재미"),
    ("게임플레이", "게임"),
    ("플레이", "게임"),
    ("Game", "게임"),
    ("업뎃", "업데이트"),
    ("패치", "업데이트"),
    ("업그레이드", "업데이트"),
    ("타격", "타격감"),
    ("랙", "최적화"),
    ("렉", "최적화"),
    ("튕김", "최적화"),
    ("발열", "최적화"),
    ("버벅", "최적화"),
    ("끊김", "최적화"),
    ("캐릭", "캐릭터"),
    ("여캐", "캐릭터"),
    ("남캐", "캐릭터"),
    ("현질", "과금"),
    ("과금유도", "과금"),
    ("운영자", "운영"),
    ("개발자", "운영"),
    ("아트", "아트/그래픽"),
    ("그래픽", "아트/그래픽"),
    ("일러", "아트/그래픽"),
    ("일러스트", "아트/그래픽"),
];

/// Built-in generic tokens hidden from keyword-frequency outputs.
const DEFAULT_STOP_WORDS: &[&str] = &[
    "재미", "게임", "Good", "Play", "하는", "할", "함", "전투", "유저", "사람", "것", "수", "저", "제",
];

/// Upper bound on synonym chain length when resolving canonical labels.
const MAX_CHAIN_DEPTH: usize = 32;

// ── KeywordTable ──────────────────────────────────────────────────────────────

/// Serializable synonym table and stop-list.
///
/// ```json
/// { "synonyms": { "렉": "최적화" }, "stop_words": ["게임"] }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeywordTable {
    #[serde(default)]
    pub synonyms: HashMap<String, String>,
    #[serde(default)]
    pub stop_words: Vec<String>,
}

impl Default for KeywordTable {
    fn default() -> Self {
        Self {
            synonyms: DEFAULT_SYNONYMS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            stop_words: DEFAULT_STOP_WORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl KeywordTable {
    /// Load a table from a JSON file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| InsightError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let table: KeywordTable = serde_json::from_str(&content)?;
        debug!(
            "Loaded keyword table from {}: {} synonyms, {} stop words",
            path.display(),
            table.synonyms.len(),
            table.stop_words.len()
        );
        Ok(table)
    }
}

// ── KeywordConsolidator ───────────────────────────────────────────────────────

/// Maps raw keyword tokens to canonical display labels.
///
/// Lookup order: the trimmed token, then the token with all whitespace
/// removed, else the trimmed token itself. Synonym targets are resolved to
/// their fixpoint at construction so consolidation is idempotent for any table.
#[derive(Debug, Clone)]
pub struct KeywordConsolidator {
    synonyms: HashMap<String, String>,
    stop_words: HashSet<String>,
}

impl Default for KeywordConsolidator {
    fn default() -> Self {
        Self::new(KeywordTable::default())
    }
}

impl KeywordConsolidator {
    pub fn new(table: KeywordTable) -> Self {
        let raw = table.synonyms;
        let resolved = raw
            .keys()
            .map(|key| (key.clone(), Self::resolve_chain(&raw, key)))
            .collect();
        Self {
            synonyms: resolved,
            stop_words: table
                .stop_words
                .into_iter()
                .map(|s| s.trim().to_string())
                .collect(),
        }
    }

    /// Canonical label for `token`.
    pub fn consolidate(&self, token: &str) -> String {
        Self::lookup(&self.synonyms, token)
            .cloned()
            .unwrap_or_else(|| token.trim().to_string())
    }

    /// Whether a (canonical) keyword is excluded from frequency outputs.
    pub fn is_stop_word(&self, keyword: &str) -> bool {
        self.stop_words.contains(keyword.trim())
    }

    /// Consolidate `token`, returning `None` when the result is empty or a stop word.
    pub fn display_keyword(&self, token: &str) -> Option<String> {
        let canonical = self.consolidate(token);
        if canonical.is_empty() || self.is_stop_word(&canonical) {
            None
        } else {
            Some(canonical)
        }
    }

    fn lookup<'m>(map: &'m HashMap<String, String>, token: &str) -> Option<&'m String> {
        let trimmed = token.trim();
        map.get(trimmed).or_else(|| {
            let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
            map.get(&compact)
        })
    }

    /// Follow `start` through the raw table until a label maps to nothing new.
    fn resolve_chain(raw: &HashMap<String, String>, start: &str) -> String {
        let mut current = start.trim().to_string();
        let mut seen = HashSet::new();
        for _ in 0..MAX_CHAIN_DEPTH {
            if !seen.insert(current.clone()) {
                warn!("Synonym cycle detected at \"{}\"", current);
                break;
            }
            match Self::lookup(raw, &current) {
                Some(next) if next.trim() != current => current = next.trim().to_string(),
                _ => break,
            }
        }
        current
    }
}
