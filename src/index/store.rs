//! Ordered key-value store abstraction shared by every index.
//!
//! [`Store`] is implemented by the transient [`MemoryStore`] and by the
//! file-backed [`PersistedStore`](crate::index::table::PersistedStore).
//! Reads may fail when a backend has to touch disk; writes always land in
//! memory first and become durable on commit.

use crate::error::Result;
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::ops::RangeBounds;

/// Ordered associative container
pub trait Store<K: Ord + Clone, V: Clone> {
    /// Point lookup
    fn get(&self, key: &K) -> Result<Option<V>>;

    /// Entries whose keys fall in `range`, in ascending key order
    fn range<R: RangeBounds<K>>(&self, range: R) -> Result<Vec<(K, V)>>;

    /// Insert or replace
    fn put(&mut self, key: K, value: V);

    /// Remove `key`; removing an absent key is a no-op
    fn remove(&mut self, key: &K);

    /// Every entry in key order
    fn entries(&self) -> Result<Vec<(K, V)>> {
        self.range(..)
    }

    fn contains_key(&self, key: &K) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.entries()?.len())
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// In-memory store without durability
#[derive(Debug, Clone)]
pub struct MemoryStore<K, V> {
    map: BTreeMap<K, V>,
}

impl<K: Ord, V> Default for MemoryStore<K, V> {
    fn default() -> Self {
        Self {
            map: BTreeMap::new(),
        }
    }
}

impl<K: Ord, V> MemoryStore<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, K, V> {
        self.map.iter()
    }

    pub fn range_iter<R: RangeBounds<K>>(&self, range: R) -> btree_map::Range<'_, K, V> {
        self.map.range(range)
    }

    pub fn get_ref(&self, key: &K) -> Option<&V> {
        self.map.get(key)
    }

    /// Remove and return the previous value
    pub fn take(&mut self, key: &K) -> Option<V> {
        self.map.remove(key)
    }

    pub fn count(&self) -> usize {
        self.map.len()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn into_map(self) -> BTreeMap<K, V> {
        self.map
    }
}

impl<K: Ord, V> From<BTreeMap<K, V>> for MemoryStore<K, V> {
    fn from(map: BTreeMap<K, V>) -> Self {
        Self { map }
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for MemoryStore<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            map: iter.into_iter().collect(),
        }
    }
}

impl<K: Ord + Clone, V: Clone> Store<K, V> for MemoryStore<K, V> {
    fn get(&self, key: &K) -> Result<Option<V>> {
        Ok(self.map.get(key).cloned())
    }

    fn range<R: RangeBounds<K>>(&self, range: R) -> Result<Vec<(K, V)>> {
        Ok(self
            .map
            .range(range)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn put(&mut self, key: K, value: V) {
        self.map.insert(key, value);
    }

    fn remove(&mut self, key: &K) {
        self.map.remove(key);
    }

    fn len(&self) -> Result<usize> {
        Ok(self.map.len())
    }
}

/// A single pending mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write<K, V> {
    Put(K, V),
    Remove(K),
}

/// Mutations computed against a store but not yet applied to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteBatch<K, V> {
    ops: Vec<Write<K, V>>,
}

impl<K, V> Default for WriteBatch<K, V> {
    fn default() -> Self {
        Self { ops: Vec::new() }
    }
}

impl<K: Ord + Clone, V: Clone> WriteBatch<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: K, value: V) {
        self.ops.push(Write::Put(key, value));
    }

    pub fn remove(&mut self, key: K) {
        self.ops.push(Write::Remove(key));
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of keys this batch deletes outright
    pub fn removals(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, Write::Remove(_)))
            .count()
    }

    pub fn ops(&self) -> &[Write<K, V>] {
        &self.ops
    }

    /// Apply every mutation in order
    pub fn apply<S: Store<K, V>>(self, store: &mut S) {
        for op in self.ops {
            match op {
                Write::Put(key, value) => store.put(key, value),
                Write::Remove(key) => store.remove(&key),
            }
        }
    }
}
