//! Least-recently-used eviction.

use std::collections::VecDeque;

use crate::{
    cache::{CacheKey, CachePolicy},
    error::ErrorState,
};

/// Evicts the key that has gone unused the longest.
///
/// The recency list keeps the most recently used key at the front; the
/// victim is popped from the back.
#[derive(Debug)]
pub struct LruPolicy {
    capacity: usize,
    recency: VecDeque<CacheKey>,
}

impl LruPolicy {
    /// Creates a policy enforcing `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { capacity, recency: VecDeque::with_capacity(capacity) }
    }
}

impl<T> CachePolicy<T> for LruPolicy {
    fn should_cache(&self, _value: &T) -> bool {
        self.recency.len() < self.capacity
    }

    fn on_insert(&mut self, key: CacheKey, _value: &T) {
        self.recency.push_front(key);
    }

    fn on_access(&mut self, key: CacheKey, _value: &T) {
        if let Some(position) = self.recency.iter().position(|k| *k == key) {
            self.recency.remove(position);
            self.recency.push_front(key);
        }
    }

    fn select_victim(&mut self) -> Result<CacheKey, ErrorState> {
        self.recency
            .pop_back()
            .ok_or_else(|| ErrorState::resource("cache is empty"))
    }

    fn max_size(&self) -> usize { self.capacity }
}
