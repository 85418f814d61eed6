//! Precision-aware eviction.

use std::collections::VecDeque;

use fxhash::FxHashMap;

use crate::{
    cache::{CacheKey, CachePolicy},
    error::ErrorState,
    store::PrecisionLevel,
};

/// Number of precision partitions the policy distinguishes.
pub const MAX_PRECISION_LEVELS: usize = 32;

/// Partitions cached keys by the precision level inferred from their
/// values and evicts from over-full, stale levels first.
///
/// Each level holds at most `max_entries_per_level` keys; a level that
/// fills up is compressed toward the next coarser one (the oldest half of
/// its keys moves to `L-1`). Victim selection walks the levels from least
/// recently used to most, picking the first whose population exceeds half
/// its budget, and falls back to the highest populated level; within a
/// level the oldest key goes first.
pub struct FractalPolicy<T> {
    max_entries_per_level: usize,
    keys_by_level: FxHashMap<PrecisionLevel, VecDeque<CacheKey>>,
    level_recency: VecDeque<PrecisionLevel>,
    estimator: Box<dyn Fn(&T) -> PrecisionLevel + Send>,
    total: usize,
}

impl<T> FractalPolicy<T> {
    const DEFAULT_LEVEL: PrecisionLevel = 4;

    /// Creates a policy with the default (constant, mid-range) precision
    /// estimator.
    #[must_use]
    pub fn new(max_entries_per_level: usize) -> Self {
        Self::with_estimator(max_entries_per_level, |_| Self::DEFAULT_LEVEL)
    }

    /// Creates a policy inferring each value's precision level with
    /// `estimator`.
    pub fn with_estimator(
        max_entries_per_level: usize,
        estimator: impl Fn(&T) -> PrecisionLevel + Send + 'static,
    ) -> Self {
        Self {
            max_entries_per_level,
            keys_by_level: FxHashMap::default(),
            level_recency: VecDeque::new(),
            estimator: Box::new(estimator),
            total: 0,
        }
    }

    fn level_of(&self, value: &T) -> PrecisionLevel {
        (self.estimator)(value).min(MAX_PRECISION_LEVELS as PrecisionLevel - 1)
    }

    fn touch(&mut self, level: PrecisionLevel) {
        if let Some(position) =
            self.level_recency.iter().position(|l| *l == level)
        {
            self.level_recency.remove(position);
        }
        self.level_recency.push_front(level);
    }

    /// Moves the oldest half of a full level's keys one level coarser.
    fn compress_level(&mut self, level: PrecisionLevel) {
        if level == 0 {
            return;
        }

        let Some(keys) = self.keys_by_level.get_mut(&level) else { return };
        let moved = keys.len() / 2;
        let displaced: Vec<_> = keys.drain(..moved).collect();

        self.keys_by_level
            .entry(level - 1)
            .or_default()
            .extend(displaced);
    }

    fn population(&self, level: PrecisionLevel) -> usize {
        self.keys_by_level.get(&level).map_or(0, VecDeque::len)
    }

    fn victim_level(&self) -> Option<PrecisionLevel> {
        // least recently used level that is over half budget
        let stale_and_full = self
            .level_recency
            .iter()
            .rev()
            .copied()
            .find(|&level| self.population(level) > self.max_entries_per_level / 2);

        stale_and_full.or_else(|| {
            // fallback: the highest populated level
            self.keys_by_level
                .iter()
                .filter(|(_, keys)| !keys.is_empty())
                .map(|(&level, _)| level)
                .max()
        })
    }
}

impl<T> CachePolicy<T> for FractalPolicy<T> {
    fn should_cache(&self, _value: &T) -> bool {
        self.total < self.max_size()
    }

    fn on_insert(&mut self, key: CacheKey, value: &T) {
        let level = self.level_of(value);

        if self.population(level) >= self.max_entries_per_level {
            self.compress_level(level);
        }

        self.keys_by_level.entry(level).or_default().push_back(key);
        self.total += 1;
        self.touch(level);
    }

    fn on_access(&mut self, key: CacheKey, value: &T) {
        let level = self.level_of(value);

        if let Some(keys) = self.keys_by_level.get_mut(&level) {
            if let Some(position) = keys.iter().position(|k| *k == key) {
                keys.remove(position);
                keys.push_back(key);
            }
        }

        self.touch(level);
    }

    fn select_victim(&mut self) -> Result<CacheKey, ErrorState> {
        let level = self
            .victim_level()
            .ok_or_else(|| ErrorState::resource("cache is empty"))?;

        let victim = self
            .keys_by_level
            .get_mut(&level)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| ErrorState::resource("cache is empty"))?;

        self.total -= 1;
        Ok(victim)
    }

    fn max_size(&self) -> usize {
        self.max_entries_per_level * MAX_PRECISION_LEVELS
    }
}

impl<T> std::fmt::Debug for FractalPolicy<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FractalPolicy")
            .field("max_entries_per_level", &self.max_entries_per_level)
            .field("total", &self.total)
            .finish_non_exhaustive()
    }
}
