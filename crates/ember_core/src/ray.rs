//! Ray type for tracing queries.

use std::sync::atomic::{AtomicU32, Ordering};

use ember_math::Vec3;

use crate::intersection::PrimitiveId;

static RAY_COUNTER: AtomicU32 = AtomicU32::new(0);

/// A ray cast into the scene.
///
/// `direction` is expected to be unit length. `source` identifies the
/// primitive the ray was cast from, so that a plane does not re-intersect
/// the surface it originated on.
#[derive(Debug, Copy, Clone)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    /// Number of bounces so far; `-1` for rays outside any bounce chain.
    pub depth: i32,
    /// Identifier of the ray, unique within a process run.
    pub id: u32,
    /// The primitive this ray was cast from, if any.
    pub source: Option<PrimitiveId>,
}

impl Ray {
    /// Create a new ray. The id is minted from a process-wide counter.
    pub fn new(origin: Vec3, direction: Vec3, depth: i32, source: Option<PrimitiveId>) -> Self {
        Self {
            origin,
            direction,
            depth,
            id: RAY_COUNTER.fetch_add(1, Ordering::Relaxed),
            source,
        }
    }

    /// The point along the ray at parameter t: `origin + t * direction`.
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}
