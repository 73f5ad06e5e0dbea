//! The process-lifetime quasi-random sample table.

use std::sync::atomic::{AtomicU32, Ordering};

use ember_core::halton;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Cursor mask; the table holds `MASK + 1` values.
const MASK: u32 = 0xF_FFFF;

/// Number of entries (2^20).
const SIZE: usize = (MASK + 1) as usize;

/// A fixed table of low-discrepancy values shared by every sampling call.
///
/// Filled once with the base-2 Halton sequence, then shuffled with an
/// OS-entropy-seeded generator. Lookups advance a relaxed atomic cursor;
/// sample order across threads is unspecified and does not need to be.
pub struct SampleTable {
    values: Vec<f32>,
    cursor: AtomicU32,
}

impl SampleTable {
    /// Build the table with a fresh entropy-seeded shuffle.
    pub fn new() -> Self {
        Self::shuffled_with(&mut StdRng::from_entropy())
    }

    /// Build the table shuffled by the given generator.
    pub fn shuffled_with(rng: &mut impl Rng) -> Self {
        let mut values: Vec<f32> = (0..SIZE).map(|index| halton(index as u32, 2)).collect();
        values.shuffle(rng);

        Self {
            values,
            cursor: AtomicU32::new(0),
        }
    }

    /// The next table value; wraps around the table indefinitely.
    pub fn next_value(&self) -> f32 {
        let cursor = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.values[(cursor & MASK) as usize]
    }
}

impl Default for SampleTable {
    fn default() -> Self {
        Self::new()
    }
}
