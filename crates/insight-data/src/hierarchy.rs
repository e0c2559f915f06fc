//! Topic → primary keyword frequency tree for one sentiment class.

use insight_core::calculations::FrequencyTable;
use insight_core::models::{ReviewRecord, SentimentLabel};
use serde::Serialize;

use crate::normalizer::DatasetSnapshot;

/// Topic values that carry no information and are left out of the tree.
pub const GENERIC_TOPICS: &[&str] = &["Etc", "Unknown", "None", "nan", ""];

/// Primary keyword of a record with an empty keyword list.
pub const EMPTY_KEYWORD: &str = "Etc";

/// Primary keyword used when the dataset has no keyword column at all.
pub const MISSING_KEYWORD: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordLeaf {
    pub keyword: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicNode {
    pub topic: String,
    /// Sum of the counts of the surviving leaves.
    pub total: usize,
    pub keywords: Vec<KeywordLeaf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicHierarchy {
    pub sentiment: SentimentLabel,
    pub topics: Vec<TopicNode>,
}

impl TopicHierarchy {
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

/// Build the hierarchy for `sentiment`. Pairs seen `min_count` times or fewer
/// are pruned; topics and leaves are ordered by count, descending.
pub fn build_hierarchy(
    snapshot: &DatasetSnapshot,
    sentiment: SentimentLabel,
    min_count: usize,
) -> TopicHierarchy {
    let has_keywords = snapshot.has_column("keywords");

    let pairs: FrequencyTable<(&str, &str)> = snapshot
        .records()
        .iter()
        .filter(|r| r.sentiment_label == sentiment)
        .filter(|r| !GENERIC_TOPICS.contains(&r.topic.as_str()))
        .map(|r| (r.topic.as_str(), primary_keyword(r, has_keywords)))
        .collect();

    let mut topics: Vec<TopicNode> = Vec::new();
    for ((topic, keyword), count) in pairs.ranked() {
        if count <= min_count {
            continue;
        }
        let leaf = KeywordLeaf {
            keyword: keyword.to_string(),
            count,
        };
        match topics.iter_mut().find(|node| node.topic == topic) {
            Some(node) => {
                node.total += count;
                node.keywords.push(leaf);
            }
            None => topics.push(TopicNode {
                topic: topic.to_string(),
                total: count,
                keywords: vec![leaf],
            }),
        }
    }
    topics.sort_by(|a, b| b.total.cmp(&a.total));

    TopicHierarchy { sentiment, topics }
}

fn primary_keyword(record: &ReviewRecord, has_keywords: bool) -> &str {
    if !has_keywords {
        return MISSING_KEYWORD;
    }
    record.primary_keyword().unwrap_or(EMPTY_KEYWORD)
}
