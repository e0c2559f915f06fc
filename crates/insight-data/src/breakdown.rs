//! Most-mentioned consolidated keywords per sentiment class.

use insight_core::calculations::FrequencyTable;
use insight_core::keywords::KeywordConsolidator;
use insight_core::models::SentimentLabel;
use serde::Serialize;

use crate::normalizer::DatasetSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordCount {
    pub keyword: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentKeywords {
    pub sentiment: SentimentLabel,
    /// Keyword mentions counted for this class after filtering.
    pub mentions: usize,
    pub keywords: Vec<KeywordCount>,
}

/// Top `top_n` keywords for every sentiment class, in display order.
///
/// Keywords are consolidated first; empty tokens and stop words are dropped
/// before counting.
pub fn keyword_breakdown(
    snapshot: &DatasetSnapshot,
    consolidator: &KeywordConsolidator,
    top_n: usize,
) -> Vec<SentimentKeywords> {
    SentimentLabel::ALL
        .iter()
        .map(|&sentiment| {
            let table: FrequencyTable<String> = snapshot
                .records()
                .iter()
                .filter(|r| r.sentiment_label == sentiment)
                .flat_map(|r| r.keywords.iter())
                .filter_map(|k| consolidator.display_keyword(k))
                .collect();
            SentimentKeywords {
                sentiment,
                mentions: table.total(),
                keywords: table
                    .top(top_n)
                    .into_iter()
                    .map(|(keyword, count)| KeywordCount { keyword, count })
                    .collect(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use insight_core::models::ReviewRecord;

    fn record(label: SentimentLabel, keywords: &[&str]) -> ReviewRecord {
        let mut r = ReviewRecord::new("r", label);
        r.keywords = keywords.iter().map(|k| k.to_string()).collect();
        r
    }

    #[test]
    fn test_synonyms_merge_and_stop_words_drop() {
        let snap = DatasetSnapshot::from_records(
            vec![
                record(SentimentLabel::Negative, &["렉", "튕김", "게임"]),
                record(SentimentLabel::Negative, &["현질", "버벅"]),
                record(SentimentLabel::Positive, &["꿀잼", "일러"]),
            ],
            &["keywords"],
        );
        let result = keyword_breakdown(&snap, &KeywordConsolidator::default(), 10);

        assert_eq!(result.len(), 3);
        let negative = &result[0];
        assert_eq!(negative.sentiment, SentimentLabel::Negative);
        assert_eq!(
            negative.keywords,
            vec![
                KeywordCount {
                    keyword: "최적화".to_string(),
                    count: 3
                },
                KeywordCount {
                    keyword: "과금".to_string(),
                    count: 1
                },
            ]
        );
        assert_eq!(negative.mentions, 4);

        let positive = &result[2];
        assert_eq!(positive.keywords.len(), 1);
        assert_eq!(positive.keywords[0].keyword, "아트/그래픽");
        assert!(result[1].keywords.is_empty());
    }

    #[test]
    fn test_top_n_limit() {
        let keywords: Vec<String> = (0..15).map(|i| format!("kw{}", i)).collect();
        let refs: Vec<&str> = keywords.iter().map(String::as_str).collect();
        let snap = DatasetSnapshot::from_records(
            vec![record(SentimentLabel::Neutral, &refs)],
            &["keywords"],
        );
        let result = keyword_breakdown(&snap, &KeywordConsolidator::default(), 10);
        assert_eq!(result[1].keywords.len(), 10);
        assert_eq!(result[1].mentions, 15);
    }
}
