//! In-memory reference model.
//!
//! Ground truth for what the store must return later. An entry exists iff
//! the most recent write for that key was confirmed successful and no
//! successful delete followed it. Only the scenario runner mutates it, and
//! only on confirmed outcomes.

use std::collections::HashMap;

/// Expected store contents, keyed by raw key bytes.
#[derive(Debug, Default)]
pub struct Oracle {
    entries: HashMap<Vec<u8>, Vec<u8>>,
}

impl Oracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a confirmed-successful write. Returns the value this write
    /// displaced, so the caller can tell a first write from an upsert.
    pub fn record(&mut self, key: Vec<u8>, value: Vec<u8>) -> Option<Vec<u8>> {
        self.entries.insert(key, value)
    }

    /// The value the store must return for `key`, if any.
    pub fn expected(&self, key: &[u8]) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all expected `(key, value)` pairs, in no particular
    /// order.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
    }
}
