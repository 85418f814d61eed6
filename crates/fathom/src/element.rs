//! The element trait bound required of node value types.
//!
//! A graph is generic over one element type `T`. Most of the engine only
//! needs `T` to be cloneable and comparable, but the fractal store and the
//! caches behave better when they understand the numeric structure of the
//! values they hold. [`Element`] exposes that structure as a small set of
//! hooks with conservative defaults, so non-numeric types participate
//! without ceremony while numeric types get weighted merging, moving-average
//! blending and level expansion for free.

use std::fmt::Debug;

use crate::cache::CacheKey;

/// A value type that can flow through a computation graph.
///
/// All hooks have defaults suitable for opaque types: merging keeps the
/// last write (winner-takes-all), blending replaces, distance is `0.0` iff
/// equal, and refinement is the identity. The provided implementations for
/// the primitive numeric types replace these with the arithmetic variants
/// used by the fractal store.
///
/// # Cache keys
///
/// [`Element::cache_key`] derives the 64-bit key the value cache indexes
/// by. The default hashes the `Debug` rendering, which is correct whenever
/// `Debug` is faithful to equality; types with a cheaper or more precise
/// identity should override it (numeric impls hash the value bits).
pub trait Element: Clone + Debug + PartialEq + Send + Sync + 'static {
    /// Collapses a non-empty batch of weighted samples into one value.
    ///
    /// # Panics
    ///
    /// Panics if `samples` is empty.
    fn weighted_mean(samples: &[(Self, f64)]) -> Self {
        samples
            .last()
            .expect("weighted_mean requires at least one sample")
            .0
            .clone()
    }

    /// Combines an existing value with an incoming one, keeping `retain`
    /// of the existing value.
    fn blend(&self, incoming: &Self, _retain: f64) -> Self {
        incoming.clone()
    }

    /// Measures how far apart two values are, for compression decisions.
    fn distance(&self, other: &Self) -> f64 {
        if self == other {
            0.0
        } else {
            1.0
        }
    }

    /// Expands a value stored at a coarser precision level to a level
    /// `levels` steps finer.
    fn refine(&self, _levels: u32) -> Self { self.clone() }

    /// Derives the key this value is cached under.
    fn cache_key(&self) -> CacheKey {
        CacheKey(fxhash::hash64(&format!("{self:?}")))
    }
}

macro_rules! float_element {
    ($($ty:ty),* $(,)?) => {$(
        impl Element for $ty {
            fn weighted_mean(samples: &[(Self, f64)]) -> Self {
                assert!(!samples.is_empty(), "weighted_mean requires at least one sample");

                let mut numerator = 0.0_f64;
                let mut denominator = 0.0_f64;
                for (value, weight) in samples {
                    numerator += f64::from(*value) * weight;
                    denominator += weight;
                }

                (numerator / denominator) as $ty
            }

            fn blend(&self, incoming: &Self, retain: f64) -> Self {
                (f64::from(*self) * retain + f64::from(*incoming) * (1.0 - retain)) as $ty
            }

            fn distance(&self, other: &Self) -> f64 {
                (f64::from(*self) - f64::from(*other)).abs()
            }

            fn refine(&self, levels: u32) -> Self {
                let scale = 10.0_f64.powi(levels as i32);
                ((f64::from(*self) * scale).round() / scale) as $ty
            }

            fn cache_key(&self) -> CacheKey {
                CacheKey(fxhash::hash64(&self.to_bits()))
            }
        }
    )*};
}

float_element!(f32, f64);

macro_rules! integer_element {
    ($($ty:ty),* $(,)?) => {$(
        impl Element for $ty {
            fn weighted_mean(samples: &[(Self, f64)]) -> Self {
                assert!(!samples.is_empty(), "weighted_mean requires at least one sample");

                let mut numerator = 0.0_f64;
                let mut denominator = 0.0_f64;
                for (value, weight) in samples {
                    numerator += *value as f64 * weight;
                    denominator += weight;
                }

                (numerator / denominator).round() as $ty
            }

            fn blend(&self, incoming: &Self, retain: f64) -> Self {
                (*self as f64 * retain + *incoming as f64 * (1.0 - retain)).round() as $ty
            }

            fn distance(&self, other: &Self) -> f64 {
                (*self as f64 - *other as f64).abs()
            }

            // Rounding an integer to any number of decimals is the identity.
            fn refine(&self, _levels: u32) -> Self { *self }

            fn cache_key(&self) -> CacheKey {
                CacheKey(fxhash::hash64(self))
            }
        }
    )*};
}

integer_element!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

macro_rules! opaque_element {
    ($($ty:ty),* $(,)?) => {$(
        impl Element for $ty {
            fn cache_key(&self) -> CacheKey {
                CacheKey(fxhash::hash64(self))
            }
        }
    )*};
}

opaque_element!(bool, String, ());

#[cfg(test)]
mod test;
