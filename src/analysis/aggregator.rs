//! Shared accumulation primitives.
//!
//! Every statistic family folds its event list into per-key accumulators and
//! then turns each accumulator into a summary record. The helpers here keep
//! that fold deterministic: groups come back in first-seen order and
//! "most frequent" picks are stable scans where the earliest leader wins ties.

use std::collections::HashMap;

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Ratio of two counts, 0 when the denominator is 0. Never clamped.
pub fn rate(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Arithmetic mean, `None` for an empty sample.
pub fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        None
    } else {
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }
}

/// Accumulators keyed by a group id, iterated in first-seen order.
#[derive(Debug, Clone)]
pub struct GroupedAccumulator<A> {
    index: HashMap<String, usize>,
    groups: Vec<(String, A)>,
}

impl<A> Default for GroupedAccumulator<A> {
    fn default() -> Self {
        Self {
            index: HashMap::new(),
            groups: Vec::new(),
        }
    }
}

impl<A: Default> GroupedAccumulator<A> {
    /// Accumulator for `key`, created at its zero value on first use.
    pub fn entry(&mut self, key: &str) -> &mut A {
        let slot = match self.index.get(key) {
            Some(&slot) => slot,
            None => {
                self.groups.push((key.to_string(), A::default()));
                let slot = self.groups.len() - 1;
                self.index.insert(key.to_string(), slot);
                slot
            }
        };
        &mut self.groups[slot].1
    }
}

impl<A> GroupedAccumulator<A> {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &A)> {
        self.groups.iter().map(|(k, a)| (k.as_str(), a))
    }
}

impl<A> IntoIterator for GroupedAccumulator<A> {
    type Item = (String, A);
    type IntoIter = std::vec::IntoIter<(String, A)>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}

/// Occurrence counter whose peak breaks ties by first appearance.
#[derive(Debug, Clone)]
pub struct PeakCounter<K> {
    counts: Vec<(K, usize)>,
}

impl<K> Default for PeakCounter<K> {
    fn default() -> Self {
        Self { counts: Vec::new() }
    }
}

impl<K: PartialEq + Copy> PeakCounter<K> {
    pub fn record(&mut self, key: K) {
        match self.counts.iter_mut().find(|(k, _)| *k == key) {
            Some((_, count)) => *count += 1,
            None => self.counts.push((key, 1)),
        }
    }

    /// Most frequent key. The best value only moves on a strictly higher
    /// count, so the first key to reach the maximum is returned.
    pub fn peak(&self) -> Option<K> {
        let mut best: Option<(K, usize)> = None;
        for &(key, count) in &self.counts {
            match best {
                Some((_, best_count)) if count <= best_count => {}
                _ => best = Some((key, count)),
            }
        }
        best.map(|(key, _)| key)
    }
}
