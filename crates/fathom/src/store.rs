//! Per-node hierarchical value storage.
//!
//! A [`FractalStore`] keeps one value per precision level, together with a
//! batch of pending writes per level. Writes are deferred: they accumulate
//! as weighted samples and are folded into the authoritative per-level
//! value either when a level's batch grows past the merge threshold or
//! when [`FractalStore::merge_all`] runs. Merging an already-populated
//! level blends old and new with an exponential moving average, and a
//! compression sweep removes levels indistinguishable from their coarser
//! neighbor.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::element::Element;

/// A precision level. Higher means finer value fidelity.
pub type PrecisionLevel = u8;

/// The highest level any store accepts; levels live in `[0, 64)`.
pub const MAX_DEPTH: PrecisionLevel = 63;

/// Pending writes per level before an automatic merge of that level.
const MERGE_THRESHOLD: usize = 10;

/// Share of the existing absolute value kept when a merge lands on a
/// populated level.
const EMA_RETAIN: f64 = 0.7;

struct StoreInner<T> {
    absolute: BTreeMap<PrecisionLevel, T>,
    pending: BTreeMap<PrecisionLevel, Vec<(T, f64)>>,
}

/// A multi-level value store with deferred merges and adjacent-level
/// compression.
///
/// All operations are internally synchronized and take `&self`.
pub struct FractalStore<T> {
    max_depth: PrecisionLevel,
    compression_threshold: f64,
    inner: Mutex<StoreInner<T>>,
}

impl<T: Element> Default for FractalStore<T> {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_DEPTH, Self::DEFAULT_COMPRESSION_THRESHOLD)
    }
}

impl<T: Element> FractalStore<T> {
    /// Default cap on the legal precision level.
    pub const DEFAULT_MAX_DEPTH: PrecisionLevel = 8;
    /// Default tolerance for collapsing adjacent levels.
    pub const DEFAULT_COMPRESSION_THRESHOLD: f64 = 1e-3;

    /// Creates a store accepting levels up to `max_depth` (itself capped
    /// at [`MAX_DEPTH`]), collapsing adjacent levels closer than
    /// `compression_threshold`.
    pub fn new(
        max_depth: PrecisionLevel,
        compression_threshold: f64,
    ) -> Self {
        Self {
            max_depth: max_depth.min(MAX_DEPTH),
            compression_threshold,
            inner: Mutex::new(StoreInner {
                absolute: BTreeMap::new(),
                pending: BTreeMap::new(),
            }),
        }
    }

    /// Records a write of `value` at `level` (clamped to the depth cap).
    ///
    /// The write is appended to the level's pending batch with weight
    /// `1.0`; once the batch reaches the merge threshold the level is
    /// merged immediately.
    pub fn store(&self, value: T, level: PrecisionLevel) {
        let level = self.clamp(level);
        let mut inner = self.inner.lock();

        let batch = inner.pending.entry(level).or_default();
        batch.push((value, 1.0));

        if batch.len() >= MERGE_THRESHOLD {
            merge_level(&mut inner, level);
        }
    }

    /// Reads the value at `level` (clamped to the depth cap).
    ///
    /// On a miss, the nearest populated coarser level is expanded to the
    /// requested one via [`Element::refine`]. Returns `None` only when no
    /// level at or below the requested one is populated. Pending writes
    /// are not visible until merged.
    pub fn get(&self, level: PrecisionLevel) -> Option<T> {
        let level = self.clamp(level);
        let inner = self.inner.lock();

        if let Some(value) = inner.absolute.get(&level) {
            return Some(value.clone());
        }

        inner
            .absolute
            .range(..level)
            .next_back()
            .map(|(&found, value)| value.refine(u32::from(level - found)))
    }

    /// Merges every pending batch into the absolute values, then
    /// compresses the tree.
    ///
    /// Afterwards no pending writes remain at any level, and no two
    /// adjacent absolute levels are within the compression threshold.
    pub fn merge_all(&self) {
        let mut inner = self.inner.lock();

        let levels: Vec<_> = inner.pending.keys().copied().collect();
        for level in levels {
            merge_level(&mut inner, level);
        }

        compress(&mut inner, self.compression_threshold);
    }

    /// The highest level this store accepts.
    #[must_use]
    pub const fn max_depth(&self) -> PrecisionLevel { self.max_depth }

    /// The tolerance used when collapsing adjacent levels.
    #[must_use]
    pub const fn compression_threshold(&self) -> f64 {
        self.compression_threshold
    }

    /// Number of populated absolute levels.
    #[must_use]
    pub fn level_count(&self) -> usize { self.inner.lock().absolute.len() }

    /// The populated absolute levels, in ascending order.
    #[must_use]
    pub fn levels(&self) -> Vec<PrecisionLevel> {
        self.inner.lock().absolute.keys().copied().collect()
    }

    /// Total number of pending, not-yet-merged writes.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending.values().map(Vec::len).sum()
    }

    fn clamp(&self, level: PrecisionLevel) -> PrecisionLevel {
        level.min(self.max_depth)
    }
}

impl<T: Element> std::fmt::Debug for FractalStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FractalStore")
            .field("max_depth", &self.max_depth)
            .field("compression_threshold", &self.compression_threshold)
            .field("levels", &self.levels())
            .finish_non_exhaustive()
    }
}

fn merge_level<T: Element>(
    inner: &mut StoreInner<T>,
    level: PrecisionLevel,
) {
    let Some(samples) = inner.pending.remove(&level) else { return };
    if samples.is_empty() {
        return;
    }

    let merged = T::weighted_mean(&samples);

    match inner.absolute.entry(level) {
        std::collections::btree_map::Entry::Occupied(mut entry) => {
            let blended = entry.get().blend(&merged, EMA_RETAIN);
            entry.insert(blended);
        }
        std::collections::btree_map::Entry::Vacant(entry) => {
            entry.insert(merged);
        }
    }
}

fn compress<T: Element>(inner: &mut StoreInner<T>, threshold: f64) {
    // decisions use the pre-removal values, collected in one sweep
    let removable: Vec<_> = inner
        .absolute
        .iter()
        .filter(|&(&level, value)| {
            level > 0
                && inner
                    .absolute
                    .get(&(level - 1))
                    .is_some_and(|lower| value.distance(lower) < threshold)
        })
        .map(|(&level, _)| level)
        .collect();

    for level in removable {
        inner.absolute.remove(&level);
    }
}
