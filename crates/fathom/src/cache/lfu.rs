//! Least-frequently-used eviction.

use fxhash::FxHashMap;

use crate::{
    cache::{CacheKey, CachePolicy},
    error::ErrorState,
};

/// Evicts the key with the lowest access count; ties are arbitrary.
#[derive(Debug)]
pub struct LfuPolicy {
    capacity: usize,
    frequencies: FxHashMap<CacheKey, u64>,
}

impl LfuPolicy {
    /// Creates a policy enforcing `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { capacity, frequencies: FxHashMap::default() }
    }
}

impl<T> CachePolicy<T> for LfuPolicy {
    fn should_cache(&self, _value: &T) -> bool {
        self.frequencies.len() < self.capacity
    }

    fn on_insert(&mut self, key: CacheKey, _value: &T) {
        self.frequencies.insert(key, 1);
    }

    fn on_access(&mut self, key: CacheKey, _value: &T) {
        if let Some(count) = self.frequencies.get_mut(&key) {
            *count += 1;
        }
    }

    fn select_victim(&mut self) -> Result<CacheKey, ErrorState> {
        let victim = self
            .frequencies
            .iter()
            .min_by_key(|&(_, count)| *count)
            .map(|(&key, _)| key)
            .ok_or_else(|| ErrorState::resource("cache is empty"))?;

        self.frequencies.remove(&victim);
        Ok(victim)
    }

    fn max_size(&self) -> usize { self.capacity }
}
