#![forbid(unsafe_code)]

//! Keyed memoization of asynchronous loads.
//!
//! The first `get_or_load` for a key starts the load; every later call for
//! the same key, including ones issued while the load is still in flight,
//! awaits that same load. Entries live until [`MemoCache::invalidate`] or
//! [`MemoCache::clear`].

use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::future::Future;

use ahash::AHashMap;
use futures::future::{FutureExt, LocalBoxFuture, Shared};
use tracing::trace;

type Entry<V> = Shared<LocalBoxFuture<'static, V>>;

pub struct MemoCache<V: Clone + 'static> {
    entries: RefCell<AHashMap<Cow<'static, str>, Entry<V>>>,
}

impl<V: Clone + 'static> Default for MemoCache<V> {
    fn default() -> Self {
        Self {
            entries: RefCell::new(AHashMap::new()),
        }
    }
}

impl<V: Clone + 'static> fmt::Debug for MemoCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoCache")
            .field("len", &self.len())
            .finish()
    }
}

impl<V: Clone + 'static> MemoCache<V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value for `key`, calling `load` only if nothing is cached yet.
    pub async fn get_or_load<F, Fut>(&self, key: impl Into<Cow<'static, str>>, load: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + 'static,
    {
        let key = key.into();
        let cached = self.entries.borrow().get(&key).cloned();
        let entry = match cached {
            Some(entry) => {
                trace!(key = %key, "memo hit");
                entry
            }
            None => {
                trace!(key = %key, "memo miss");
                let fresh = load().boxed_local().shared();
                self.entries
                    .borrow_mut()
                    .entry(key)
                    .or_insert(fresh)
                    .clone()
            }
        };
        entry.await
    }

    /// The value for `key` if its load has completed.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        self.entries.borrow().get(key)?.peek().cloned()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }

    /// Forget one entry. Returns whether it existed.
    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.borrow_mut().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
