//! Linear-scan accelerator.

use ember_core::{Hittable, Intersection, Ray};

/// The no-structure accelerator: every query visits every primitive.
pub struct Naive<T> {
    primitives: Vec<T>,
}

impl<T: Hittable> Naive<T> {
    pub fn new(primitives: Vec<T>) -> Self {
        Self { primitives }
    }

    /// Closest-hit query.
    pub fn trace<'a>(&'a self, mut intersection: Intersection<'a>, ray: &Ray) -> Intersection<'a> {
        for primitive in &self.primitives {
            intersection = primitive.intersect(intersection, ray);
        }
        intersection
    }

    /// Any-hit query: returns on the first primitive that improves the
    /// record.
    pub fn shadow_trace<'a>(
        &'a self,
        mut intersection: Intersection<'a>,
        ray: &Ray,
    ) -> Intersection<'a> {
        for primitive in &self.primitives {
            let last = intersection.length;
            intersection = primitive.intersect(intersection, ray);
            if intersection.length < last {
                return intersection;
            }
        }
        intersection
    }

    pub fn primitives(&self) -> &[T] {
        &self.primitives
    }
}
