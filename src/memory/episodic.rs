//! Episodic Store (component C)
//!
//! A bounded, insertion-ordered log of observations. Entries carry a
//! monotonic id that is stable for the entry's lifetime; the key index maps
//! keys to ids rather than physical positions, so eviction never requires
//! renumbering the whole index — only the evicted entry's own key-list
//! shrinks by one. Modeled on the same drain-offset approach to the
//! "bounded log, cheap eviction, stable handles" problem used elsewhere
//! in this codebase's audit log.

use crate::attr::{match_pattern, Attribute, AttrPattern, Bindings};
use std::collections::{HashMap, VecDeque};

/// A single stored observation.
#[derive(Debug, Clone)]
pub struct EpisodicEntry {
    pub id: u64,
    pub attr: Attribute,
    pub timestamp: f64,
    pub source: Option<String>,
}

/// Snapshot statistics over the episodic log.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodicStatistics {
    pub total_entries: usize,
    pub unique_keys: usize,
    pub capacity: usize,
    pub oldest_timestamp: Option<f64>,
    pub newest_timestamp: Option<f64>,
    pub time_span_seconds: Option<f64>,
}

pub struct EpisodicStore {
    entries: HashMap<u64, EpisodicEntry>,
    order: VecDeque<u64>,
    index_by_key: HashMap<String, Vec<u64>>,
    next_id: u64,
    max_entries: usize,
}

impl EpisodicStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            index_by_key: HashMap::new(),
            next_id: 0,
            max_entries: max_entries.max(1),
        }
    }

    /// Store an observation, evicting the oldest entry if over capacity.
    pub fn store(&mut self, attr: Attribute, source: Option<String>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        let key = attr.key.clone();
        let timestamp = attr.timestamp;
        let entry = EpisodicEntry {
            id,
            attr,
            timestamp,
            source,
        };

        self.entries.insert(id, entry);
        self.order.push_back(id);
        self.index_by_key.entry(key).or_default().push(id);

        if self.order.len() > self.max_entries {
            self.evict_oldest();
        }

        id
    }

    fn evict_oldest(&mut self) {
        let Some(id) = self.order.pop_front() else {
            return;
        };
        if let Some(entry) = self.entries.remove(&id) {
            if let Some(ids) = self.index_by_key.get_mut(&entry.attr.key) {
                ids.retain(|&i| i != id);
                if ids.is_empty() {
                    self.index_by_key.remove(&entry.attr.key);
                }
            }
        }
    }

    fn entry(&self, id: u64) -> &EpisodicEntry {
        self.entries.get(&id).expect("order and entries stay in sync")
    }

    /// The `count` most recent entries, oldest first.
    pub fn get_recent(&self, count: usize) -> Vec<&EpisodicEntry> {
        let skip = self.order.len().saturating_sub(count);
        self.order.iter().skip(skip).map(|&id| self.entry(id)).collect()
    }

    /// Entries whose timestamp falls within `[start, end]`, in log order.
    pub fn get_by_timerange(&self, start: f64, end: f64) -> Vec<&EpisodicEntry> {
        self.order
            .iter()
            .map(|&id| self.entry(id))
            .filter(|e| e.timestamp >= start && e.timestamp <= end)
            .collect()
    }

    /// Entries with the given root key, most recent `limit` if given.
    pub fn get_by_key(&self, key: &str, limit: Option<usize>) -> Vec<&EpisodicEntry> {
        let Some(ids) = self.index_by_key.get(key) else {
            return Vec::new();
        };
        let slice: &[u64] = match limit {
            Some(n) => {
                let skip = ids.len().saturating_sub(n);
                &ids[skip..]
            }
            None => ids,
        };
        slice.iter().map(|&id| self.entry(id)).collect()
    }

    /// Pattern search, most recent entries first, stopping at `limit` matches.
    pub fn search_pattern(
        &self,
        pattern: &AttrPattern,
        limit: Option<usize>,
    ) -> Vec<(&EpisodicEntry, Bindings)> {
        let mut results = Vec::new();
        for &id in self.order.iter().rev() {
            let entry = self.entry(id);
            let result = match_pattern(pattern, &entry.attr);
            if result.success {
                results.push((entry, result.bindings));
                if let Some(limit) = limit {
                    if results.len() >= limit {
                        break;
                    }
                }
            }
        }
        results
    }

    /// Sliding-window temporal pattern detection.
    pub fn get_temporal_patterns(&self, window_size: usize) -> Vec<Vec<&EpisodicEntry>> {
        if self.order.len() < window_size || window_size == 0 {
            return Vec::new();
        }

        let ordered: Vec<&EpisodicEntry> = self.order.iter().map(|&id| self.entry(id)).collect();
        let mut patterns = Vec::new();

        for window in ordered.windows(window_size) {
            if is_interesting_sequence(window) {
                patterns.push(window.to_vec());
            }
        }

        patterns
    }

    /// Exact-string-dedup compression within each key group, keeping the
    /// more recent of any exact duplicate pair. Returns the number removed.
    pub fn compress_similar(&mut self) -> usize {
        if self.entries.len() < 2 {
            return 0;
        }

        let original_count = self.entries.len();
        let mut to_remove: Vec<u64> = Vec::new();

        for ids in self.index_by_key.values() {
            for i in 0..ids.len() {
                if to_remove.contains(&ids[i]) {
                    continue;
                }
                for &other in &ids[i + 1..] {
                    if to_remove.contains(&other) {
                        continue;
                    }
                    let a = self.entry(ids[i]);
                    let b = self.entry(other);
                    if a.attr.to_compact_string() == b.attr.to_compact_string() {
                        if a.timestamp < b.timestamp {
                            to_remove.push(ids[i]);
                            break;
                        } else {
                            to_remove.push(other);
                        }
                    }
                }
            }
        }

        for id in &to_remove {
            self.entries.remove(id);
        }
        self.order.retain(|id| !to_remove.contains(id));
        for ids in self.index_by_key.values_mut() {
            ids.retain(|id| !to_remove.contains(id));
        }
        self.index_by_key.retain(|_, ids| !ids.is_empty());

        original_count - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    pub fn statistics(&self) -> EpisodicStatistics {
        if self.entries.is_empty() {
            return EpisodicStatistics {
                total_entries: 0,
                unique_keys: 0,
                capacity: self.max_entries,
                oldest_timestamp: None,
                newest_timestamp: None,
                time_span_seconds: None,
            };
        }

        let oldest = self.entries.values().map(|e| e.timestamp).fold(f64::MAX, f64::min);
        let newest = self.entries.values().map(|e| e.timestamp).fold(f64::MIN, f64::max);

        EpisodicStatistics {
            total_entries: self.entries.len(),
            unique_keys: self.index_by_key.len(),
            capacity: self.max_entries,
            oldest_timestamp: Some(oldest),
            newest_timestamp: Some(newest),
            time_span_seconds: Some(newest - oldest),
        }
    }
}

fn is_interesting_sequence(window: &[&EpisodicEntry]) -> bool {
    if window.len() < 2 {
        return false;
    }

    let first_key = &window[0].attr.key;
    if window.iter().all(|e| &e.attr.key == first_key) {
        return true;
    }

    let intervals: Vec<f64> = window
        .windows(2)
        .map(|pair| pair[1].timestamp - pair[0].timestamp)
        .collect();
    if intervals.is_empty() {
        return false;
    }

    let avg = intervals.iter().sum::<f64>() / intervals.len() as f64;
    if avg == 0.0 {
        return false;
    }
    let variance = intervals.iter().map(|i| (i - avg).powi(2)).sum::<f64>() / intervals.len() as f64;
    let std_dev = variance.sqrt();

    (std_dev / avg).abs() < 0.20
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::Atom;

    fn obs(key: &str, value: i64, timestamp: f64) -> Attribute {
        Attribute::with_timestamp(
            key,
            crate::attr::AttributeValue::Atom { data: Atom::Int(value) },
            timestamp,
        )
    }

    #[test]
    fn store_and_get_recent_preserves_order() {
        let mut store = EpisodicStore::new(10);
        store.store(obs("rpm", 1, 1.0), None);
        store.store(obs("rpm", 2, 2.0), None);
        store.store(obs("rpm", 3, 3.0), None);

        let recent = store.get_recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].attr.as_atom(), Some(&Atom::Int(2)));
        assert_eq!(recent[1].attr.as_atom(), Some(&Atom::Int(3)));
    }

    #[test]
    fn eviction_keeps_index_consistent() {
        let mut store = EpisodicStore::new(2);
        store.store(obs("rpm", 1, 1.0), None);
        store.store(obs("rpm", 2, 2.0), None);
        store.store(obs("rpm", 3, 3.0), None);

        assert_eq!(store.len(), 2);
        let by_key = store.get_by_key("rpm", None);
        assert_eq!(by_key.len(), 2);
        assert_eq!(by_key[0].attr.as_atom(), Some(&Atom::Int(2)));
    }

    #[test]
    fn search_pattern_prefers_recent() {
        let mut store = EpisodicStore::new(10);
        store.store(obs("rpm", 1, 1.0), None);
        store.store(obs("rpm", 2, 2.0), None);

        let pattern = AttrPattern::new(Attribute::variable("rpm", "x").unwrap());
        let results = store.search_pattern(&pattern, Some(1));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.attr.as_atom(), Some(&Atom::Int(2)));
    }

    #[test]
    fn temporal_pattern_detects_regular_interval() {
        let mut store = EpisodicStore::new(10);
        for i in 0..5 {
            store.store(obs("tick", i, i as f64), None);
        }
        let patterns = store.get_temporal_patterns(5);
        assert_eq!(patterns.len(), 1);
    }

    #[test]
    fn compress_similar_removes_exact_duplicates_keeping_newer() {
        let mut store = EpisodicStore::new(10);
        store.store(obs("rpm", 1, 1.0), None);
        store.store(obs("rpm", 1, 2.0), None);
        store.store(obs("rpm", 2, 3.0), None);

        let removed = store.compress_similar();
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 2);
        let remaining = store.get_by_key("rpm", None);
        assert_eq!(remaining[0].timestamp, 2.0);
    }

    #[test]
    fn statistics_on_empty_store() {
        let store = EpisodicStore::new(10);
        let stats = store.statistics();
        assert_eq!(stats.total_entries, 0);
        assert!(stats.oldest_timestamp.is_none());
    }
}
