use std::hash::Hash;

use indexmap::{map::Entry, IndexMap};

/// A very basic concurrent map that is hard to misuse in an async context.
/// The number one rule is that a lock can only be held very briefly - with no calls into
/// other functions that might block (or notify listeners).
///
/// Iteration follows insertion order, removals preserve the order of the remaining entries.
pub struct SafeMap<K: Hash + Eq, V>(std::sync::RwLock<IndexMap<K, V>>);

impl<K: Hash + Eq, V> Default for SafeMap<K, V> {
    fn default() -> Self { Self::new() }
}

impl<K: Hash + Eq, V> SafeMap<K, V> {
    pub fn new() -> Self { Self(std::sync::RwLock::new(IndexMap::new())) }

    pub fn insert(&self, key: K, value: V) -> Option<V> { self.0.write().expect("Failed to lock the map").insert(key, value) }

    /// Insert only if the key is vacant. Returns false (and drops `value`) when the key is taken.
    pub fn insert_if_absent(&self, key: K, value: V) -> bool {
        match self.0.write().expect("Failed to lock the map").entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(v) => {
                v.insert(value);
                true
            }
        }
    }

    pub fn remove(&self, key: &K) -> Option<V> { self.0.write().expect("Failed to lock the map").shift_remove(key) }

    pub fn is_empty(&self) -> bool { self.0.read().expect("Failed to lock the map").is_empty() }

    pub fn len(&self) -> usize { self.0.read().expect("Failed to lock the map").len() }

    pub fn clear(&self) { self.0.write().expect("Failed to lock the map").clear(); }

    pub fn contains_key(&self, key: &K) -> bool { self.0.read().expect("Failed to lock the map").contains_key(key) }
}

impl<K: Hash + Eq, V: Clone> SafeMap<K, V> {
    pub fn get(&self, k: &K) -> Option<V> { self.0.read().expect("Failed to lock the map").get(k).cloned() }

    pub fn values(&self) -> Vec<V> { self.0.read().expect("Failed to lock the map").values().cloned().collect() }
}

impl<K: Hash + Eq + Clone, V> SafeMap<K, V> {
    pub fn keys(&self) -> Vec<K> { self.0.read().expect("Failed to lock the map").keys().cloned().collect() }
}

impl<K: Hash + Eq + std::fmt::Debug, V: std::fmt::Debug> std::fmt::Debug for SafeMap<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SafeMap {{ {:?} }}", self.0.read().expect("Failed to lock the map"))
    }
}
