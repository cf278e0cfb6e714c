//! # Once-Per-Key Cache
//!
//! `OnceMap` backs every lazily built, run-scoped cache in kval: validator
//! bundles per GVK, resolved documents per group-version, and remote fetches.
//!
//! The map lock is held only to find or insert the per-key cell. The build
//! itself runs under that cell's once-initialization, so builds for
//! different keys proceed independently, while concurrent requesters of the
//! same key wait for the single in-flight build and reuse its result.
//! Failed builds are not cached; the next requester retries.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

pub struct OnceMap<K, V> {
    cells: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> OnceMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached value for `key`, building it with `init` if absent.
    pub fn get_or_try_init<E>(
        &self,
        key: &K,
        init: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        let cell = {
            let mut cells = self.cells.lock();
            Arc::clone(cells.entry(key.clone()).or_default())
        };
        cell.get_or_try_init(init).cloned()
    }

    /// The cached value for `key`, if one has been built.
    pub fn get(&self, key: &K) -> Option<V> {
        let cell = self.cells.lock().get(key).cloned()?;
        cell.get().cloned()
    }

    /// Number of keys with a built value.
    pub fn len(&self) -> usize {
        self.cells
            .lock()
            .values()
            .filter(|cell| cell.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for OnceMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for OnceMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnceMap")
            .field("keys", &self.cells.lock().len())
            .finish()
    }
}
