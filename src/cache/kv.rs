//! Generic key-value cache.
//!
//! A typed map over the [`Substrate`]. Every write advances the substrate's
//! timestamp and fires notifiers after the data lock is released.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::substrate::Substrate;

pub struct KvCache<V: Clone> {
    data: RwLock<HashMap<String, V>>,
    substrate: Substrate,
}

impl<V: Clone> Default for KvCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> KvCache<V> {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            substrate: Substrate::new(),
        }
    }

    pub fn substrate(&self) -> &Substrate {
        &self.substrate
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.data.read().get(key).cloned()
    }

    pub fn has(&self, key: &str) -> bool {
        self.data.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Independent shallow copy of the whole map.
    pub fn get_all(&self) -> HashMap<String, V> {
        self.data.read().clone()
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        {
            let mut data = self.data.write();
            data.insert(key.into(), value);
            self.substrate.mark_updated();
        }
        self.substrate.notify_update();
    }

    /// Atomic: a single write acquisition and a single notification for the
    /// whole batch.
    pub fn set_batch(&self, entries: impl IntoIterator<Item = (String, V)>) {
        {
            let mut data = self.data.write();
            for (k, v) in entries {
                data.insert(k, v);
            }
            self.substrate.mark_updated();
        }
        self.substrate.notify_update();
    }

    pub fn delete(&self, key: &str) -> bool {
        let removed = {
            let mut data = self.data.write();
            let removed = data.remove(key).is_some();
            self.substrate.mark_updated();
            removed
        };
        self.substrate.notify_update();
        removed
    }

    pub fn clear(&self) {
        {
            let mut data = self.data.write();
            data.clear();
            self.substrate.clear();
        }
        self.substrate.notify_update();
    }
}
