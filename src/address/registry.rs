// Tue Oct 20 2026 - Alex

use ahash::AHashMap;
use std::hash::Hash;

/// Dense set with O(1) removal. Removing an entry moves the last entry into
/// its slot and re-points that entry's handle.
#[derive(Debug, Clone)]
pub struct UpdateRegistry<K> {
    entries: Vec<K>,
    positions: AHashMap<K, usize>,
}

impl<K: Copy + Eq + Hash> Default for UpdateRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Copy + Eq + Hash> UpdateRegistry<K> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            positions: AHashMap::new(),
        }
    }

    /// Returns `false` if the key was already registered.
    pub fn insert(&mut self, key: K) -> bool {
        if self.positions.contains_key(&key) {
            return false;
        }
        self.positions.insert(key, self.entries.len());
        self.entries.push(key);
        true
    }

    pub fn remove(&mut self, key: &K) -> bool {
        let Some(pos) = self.positions.remove(key) else {
            return false;
        };
        self.entries.swap_remove(pos);
        if let Some(moved) = self.entries.get(pos) {
            self.positions.insert(*moved, pos);
        }
        true
    }

    pub fn contains(&self, key: &K) -> bool {
        self.positions.contains_key(key)
    }

    pub fn position(&self, key: &K) -> Option<usize> {
        self.positions.get(key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[K] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
