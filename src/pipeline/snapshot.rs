//! Last observed content per snapshot key.

use std::collections::HashMap;

use crate::models::SnapshotKey;

/// In-memory map from snapshot key to the last extracted content.
///
/// Unbounded and unsynchronised. The cycle engine owns it exclusively.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    entries: HashMap<SnapshotKey, Vec<u8>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last observed content, or `None` if never observed.
    pub fn get(&self, key: &SnapshotKey) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Record `content` as the latest observation, replacing any previous one.
    pub fn put(&mut self, key: SnapshotKey, content: impl Into<Vec<u8>>) {
        self.entries.insert(key, content.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
