//! Latest-wins aggregation window.
//!
//! Collapses repeated candidates sharing a key into the one with the greatest
//! timestamp. Entries are replaced but never removed until [`drain`], which
//! consumes the window so it can only happen once.
//!
//! Ties: when two candidates carry the same timestamp the one absorbed later
//! (stream order) wins.
//!
//! [`drain`]: AggregationWindow::drain

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// In-memory latest-wins reducer keyed by `K`.
#[derive(Debug)]
pub struct AggregationWindow<K: Ord, V> {
    entries: BTreeMap<K, (DateTime<Utc>, V)>,
    absorbed: u64,
}

impl<K: Ord, V> Default for AggregationWindow<K, V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            absorbed: 0,
        }
    }
}

impl<K: Ord, V> AggregationWindow<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a candidate. Returns true when it replaced (or created) the
    /// retained entry for `key`.
    pub fn absorb(&mut self, key: K, at: DateTime<Utc>, value: V) -> bool {
        self.absorbed += 1;
        match self.entries.get_mut(&key) {
            Some(current) if at < current.0 => false,
            Some(current) => {
                *current = (at, value);
                true
            }
            None => {
                self.entries.insert(key, (at, value));
                true
            }
        }
    }

    /// Number of retained keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of candidates offered so far.
    pub fn absorbed(&self) -> u64 {
        self.absorbed
    }

    /// Retained timestamp for a key.
    pub fn latest(&self, key: &K) -> Option<DateTime<Utc>> {
        self.entries.get(key).map(|(at, _)| *at)
    }

    /// Consume the window, yielding every retained entry in key order.
    pub fn drain(self) -> Vec<(K, DateTime<Utc>, V)> {
        self.entries
            .into_iter()
            .map(|(key, (at, value))| (key, at, value))
            .collect()
    }
}
