use std::collections::HashMap;
use std::hash::Hash;

// ── FrequencyTable ────────────────────────────────────────────────────────────

/// Counts values while remembering the order in which each was first seen.
///
/// Ranking is by count descending; equal counts keep first-encounter order,
/// which makes modes and top-N lists deterministic for a given input order.
#[derive(Debug, Clone)]
pub struct FrequencyTable<T> {
    order: Vec<T>,
    counts: HashMap<T, usize>,
}

impl<T> Default for FrequencyTable<T> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            counts: HashMap::new(),
        }
    }
}

impl<T: Eq + Hash + Clone> FrequencyTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence of `value`.
    pub fn add(&mut self, value: T) {
        self.add_n(value, 1);
    }

    /// Record `n` occurrences of `value`.
    pub fn add_n(&mut self, value: T, n: usize) {
        match self.counts.get_mut(&value) {
            Some(count) => *count += n,
            None => {
                self.order.push(value.clone());
                self.counts.insert(value, n);
            }
        }
    }

    pub fn count(&self, value: &T) -> usize {
        self.counts.get(value).copied().unwrap_or(0)
    }

    /// Number of distinct values.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// All `(value, count)` pairs ranked by count descending.
    pub fn ranked(&self) -> Vec<(T, usize)> {
        let mut pairs: Vec<(T, usize)> = self
            .order
            .iter()
            .map(|value| (value.clone(), self.count(value)))
            .collect();
        // sort_by is stable, so ties stay in encounter order.
        pairs.sort_by(|a, b| b.1.cmp(&a.1));
        pairs
    }

    /// The `n` most frequent values.
    pub fn top(&self, n: usize) -> Vec<(T, usize)> {
        let mut ranked = self.ranked();
        ranked.truncate(n);
        ranked
    }

    /// Most frequent value; the earliest-seen one wins a tie.
    pub fn mode(&self) -> Option<T> {
        let mut best: Option<(&T, usize)> = None;
        for value in &self.order {
            let count = self.count(value);
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((value, count));
            }
        }
        best.map(|(value, _)| value.clone())
    }

    /// Values in first-encounter order.
    pub fn keys(&self) -> impl Iterator<Item = &T> {
        self.order.iter()
    }
}

impl<T: Eq + Hash + Clone> FromIterator<T> for FrequencyTable<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut table = Self::new();
        for value in iter {
            table.add(value);
        }
        table
    }
}

// ── Numeric helpers ───────────────────────────────────────────────────────────

/// Arithmetic mean; `None` for an empty input.
pub fn mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let (sum, n) = values
        .into_iter()
        .fold((0.0_f64, 0usize), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Round `value` to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10_f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// `part / whole`, or `0.0` when `whole` is zero.
pub fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_table_counts() {
        let table: FrequencyTable<&str> = ["a", "b", "a", "c", "a", "b"].into_iter().collect();
        assert_eq!(table.count(&"a"), 3);
        assert_eq!(table.count(&"b"), 2);
        assert_eq!(table.count(&"z"), 0);
        assert_eq!(table.len(), 3);
        assert_eq!(table.total(), 6);
    }

    #[test]
    fn test_ranked_ties_keep_encounter_order() {
        let table: FrequencyTable<&str> = ["x", "y", "z", "y", "x"].into_iter().collect();
        assert_eq!(table.ranked(), vec![("x", 2), ("y", 2), ("z", 1)]);
    }

    #[test]
    fn test_top_truncates() {
        let table: FrequencyTable<u8> = [1, 2, 2, 3, 3, 3].into_iter().collect();
        assert_eq!(table.top(2), vec![(3, 3), (2, 2)]);
        assert_eq!(table.top(10).len(), 3);
    }

    #[test]
    fn test_mode_tie_breaks_by_first_seen() {
        let table: FrequencyTable<&str> = ["neg", "pos", "pos", "neg"].into_iter().collect();
        assert_eq!(table.mode(), Some("neg"));
        assert_eq!(FrequencyTable::<&str>::new().mode(), None);
    }

    #[test]
    fn test_add_n_accumulates() {
        let mut table = FrequencyTable::new();
        table.add_n("k".to_string(), 4);
        table.add("k".to_string());
        assert_eq!(table.count(&"k".to_string()), 5);
    }

    #[test]
    fn test_mean_and_round() {
        assert_eq!(mean(Vec::<f64>::new()), None);
        assert_eq!(mean([1.0, 2.0, 3.0]), Some(2.0));
        assert_eq!(round_to(3.14159, 2), 3.14);
        assert_eq!(round_to(2.5, 0), 3.0);
    }

    #[test]
    fn test_ratio_zero_whole() {
        assert_eq!(ratio(3, 0), 0.0);
        assert_eq!(ratio(1, 4), 0.25);
    }
}
