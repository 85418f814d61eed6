//! Pluggable value caching.
//!
//! The graph keeps a [`GraphCache`] of computed element values, indexed by
//! a 64-bit [`CacheKey`] derived from the value itself (see
//! [`Element::cache_key`]). Eviction is delegated to a [`CachePolicy`];
//! [`LruPolicy`], [`LfuPolicy`] and the precision-aware [`FractalPolicy`]
//! are provided.
//!
//! [`Element::cache_key`]: crate::element::Element::cache_key

mod fractal;
mod lfu;
mod lru;

pub use fractal::FractalPolicy;
pub use lfu::LfuPolicy;
pub use lru::LruPolicy;

use fxhash::FxHashMap;
use parking_lot::Mutex;
use tracing::warn;

use crate::{element::Element, error::ErrorState};

/// The 64-bit key a cached value is indexed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey(pub u64);

/// Eviction bookkeeping behind a [`GraphCache`].
///
/// The cache calls `should_cache` before inserting a not-yet-present
/// value; a `false` answer makes it evict the policy's selected victim
/// first. `on_insert`/`on_access` keep the policy's books; implementations
/// never store values themselves, only keys.
pub trait CachePolicy<T>: Send {
    /// True if the cache has room for `value` without eviction.
    fn should_cache(&self, value: &T) -> bool;

    /// Records that `key` was inserted.
    fn on_insert(&mut self, key: CacheKey, value: &T);

    /// Records that `key` was read or re-stored.
    fn on_access(&mut self, key: CacheKey, value: &T);

    /// Chooses and forgets the entry to evict.
    ///
    /// # Errors
    ///
    /// Returns a [`ErrorKind::Resource`] error when the policy tracks no
    /// entries.
    ///
    /// [`ErrorKind::Resource`]: crate::error::ErrorKind::Resource
    fn select_victim(&mut self) -> Result<CacheKey, ErrorState>;

    /// The capacity this policy enforces.
    fn max_size(&self) -> usize;
}

type KeyFn<T> = Box<dyn Fn(&T) -> CacheKey + Send>;

struct CacheState<T> {
    entries: FxHashMap<CacheKey, T>,
    policy: Option<Box<dyn CachePolicy<T>>>,
    key_fn: Option<KeyFn<T>>,
}

impl<T: Element> CacheState<T> {
    fn key_of(&self, value: &T) -> CacheKey {
        self.key_fn.as_ref().map_or_else(
            || value.cache_key(),
            |derive| derive(value),
        )
    }
}

/// A mutex-guarded value cache with a pluggable eviction policy.
///
/// Without a policy the cache is unbounded. With one, the cache never
/// holds more than `policy.max_size()` entries after a `store`.
pub struct GraphCache<T: Element> {
    state: Mutex<CacheState<T>>,
}

impl<T: Element> Default for GraphCache<T> {
    fn default() -> Self { Self::new(None) }
}

impl<T: Element> GraphCache<T> {
    /// Creates a cache with an optional eviction policy.
    pub fn new(policy: Option<Box<dyn CachePolicy<T>>>) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: FxHashMap::default(),
                policy,
                key_fn: None,
            }),
        }
    }

    /// Creates a cache governed by `policy`.
    pub fn with_policy(policy: Box<dyn CachePolicy<T>>) -> Self {
        Self::new(Some(policy))
    }

    /// Inserts a value, evicting per the policy when full.
    ///
    /// Re-storing a present value only notifies the policy of an access.
    /// If the policy demands an eviction but cannot name a victim, the
    /// value is not cached (capacity is never exceeded).
    pub fn store(&self, value: T) {
        let mut state = self.state.lock();
        let key = state.key_of(&value);

        let CacheState { entries, policy, .. } = &mut *state;

        if entries.contains_key(&key) {
            if let Some(policy) = policy {
                policy.on_access(key, &value);
            }
            return;
        }

        if let Some(policy) = policy {
            if !policy.should_cache(&value) {
                match policy.select_victim() {
                    Ok(victim) => {
                        entries.remove(&victim);
                    }
                    Err(error) => {
                        warn!(%error, "cache full but no victim selectable");
                        return;
                    }
                }
            }
            policy.on_insert(key, &value);
        }

        entries.insert(key, value);
    }

    /// Looks a value up by its derived key, notifying the policy of the
    /// access on a hit.
    pub fn get(&self, value: &T) -> Option<T> {
        let mut state = self.state.lock();
        let key = state.key_of(value);

        let CacheState { entries, policy, .. } = &mut *state;

        let cached = entries.get(&key).cloned();
        if cached.is_some() {
            if let Some(policy) = policy {
                policy.on_access(key, value);
            }
        }

        cached
    }

    /// Looks a value up by key without deriving it from a value.
    pub fn get_by_key(&self, key: CacheKey) -> Option<T> {
        self.state.lock().entries.get(&key).cloned()
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize { self.state.lock().entries.len() }

    /// True if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Drops every cached entry.
    ///
    /// Policy bookkeeping is not rewound; install a fresh policy via
    /// [`GraphCache::set_policy`] to reset both sides.
    pub fn clear(&self) { self.state.lock().entries.clear(); }

    /// Replaces the eviction policy, resetting the cache contents.
    pub fn set_policy(&self, policy: Option<Box<dyn CachePolicy<T>>>) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.policy = policy;
    }

    /// Replaces the key derivation, resetting the cache contents.
    ///
    /// Use this when `T`'s [`Element::cache_key`] is not faithful to the
    /// identity the cache should use.
    ///
    /// [`Element::cache_key`]: crate::element::Element::cache_key
    pub fn set_key_fn(
        &self,
        derive: impl Fn(&T) -> CacheKey + Send + 'static,
    ) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.key_fn = Some(Box::new(derive));
    }
}

impl<T: Element> std::fmt::Debug for GraphCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphCache")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

/// A cache of one: the most recent value, if any.
///
/// Backs a node's `last_result` slot.
#[derive(Debug)]
pub struct NodeCache<T> {
    slot: Mutex<Option<T>>,
}

impl<T> Default for NodeCache<T> {
    fn default() -> Self { Self { slot: Mutex::new(None) } }
}

impl<T: Clone> NodeCache<T> {
    /// Replaces the cached value.
    pub fn store(&self, value: T) { *self.slot.lock() = Some(value); }

    /// Returns a clone of the cached value, if any.
    pub fn get(&self) -> Option<T> { self.slot.lock().clone() }

    /// Empties the cache.
    pub fn clear(&self) { *self.slot.lock() = None; }
}

#[cfg(test)]
mod test;
