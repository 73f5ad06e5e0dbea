//! Quasi-random samplers for light sampling.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Radical-inverse value of `index` in the given base (the Halton sequence).
pub fn halton(mut index: u32, base: u32) -> f32 {
    let inv_base = 1.0 / base as f32;
    let mut fraction = 1.0_f32;
    let mut result = 0.0_f32;

    while index > 0 {
        fraction *= inv_base;
        result += fraction * (index % base) as f32;
        index /= base;
    }

    result
}

/// A resettable stream of quasi-random values in `[0, 1)`.
///
/// Implementations keep their cursor behind an atomic so lights can draw
/// samples from shared references; `reset` rewinds to the first value.
pub trait Sampler: Send + Sync {
    /// The next value of the stream.
    fn sample_1d(&self) -> f32;

    /// Rewind the stream to its initial state.
    fn reset(&self);
}

/// Sampler walking the base-2 Halton sequence.
pub struct HaltonSampler {
    cursor: AtomicU32,
}

impl HaltonSampler {
    pub fn new() -> Self {
        Self {
            cursor: AtomicU32::new(0),
        }
    }
}

impl Default for HaltonSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HaltonSampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HaltonSampler")
            .field("cursor", &self.cursor.load(Ordering::Relaxed))
            .finish()
    }
}

impl Sampler for HaltonSampler {
    fn sample_1d(&self) -> f32 {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        halton(index, 2)
    }

    fn reset(&self) {
        self.cursor.store(0, Ordering::Relaxed);
    }
}
