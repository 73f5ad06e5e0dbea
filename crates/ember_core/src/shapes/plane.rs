//! Infinite plane primitive.

use ember_math::{Aabb, Vec3};

use crate::intersection::{Intersection, PrimitiveId, EPSILON};
use crate::ray::Ray;

/// Half of the side length of the synthetic bounding square a plane reports
/// for accelerator placement.
const BOUNDS_EXTENT: f32 = 100.0;

/// An infinite two-sided plane, anchored at a point.
#[derive(Debug, Clone, Copy)]
pub struct Plane {
    point: Vec3,
    normal: Vec3,
    id: PrimitiveId,
}

impl Plane {
    /// Create a plane through `point` with the given (not necessarily unit)
    /// normal.
    pub fn new(point: Vec3, normal: Vec3) -> Self {
        Self {
            point,
            normal: normal.normalize(),
            id: PrimitiveId::next(),
        }
    }

    pub fn point(&self) -> Vec3 {
        self.point
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    pub fn id(&self) -> PrimitiveId {
        self.id
    }

    /// Closest-hit test against the plane.
    ///
    /// Rejects rays cast from this plane itself, rays parallel to it, and
    /// hits outside `(EPSILON, intersection.length)`.
    pub fn intersect<'a>(&self, intersection: Intersection<'a>, ray: &Ray) -> Intersection<'a> {
        if ray.source == Some(self.id) {
            return intersection;
        }

        // Planes have two sides; only a ray truly parallel to the surface
        // misses.
        let projection = self.normal.dot(ray.direction);
        if projection.abs() < EPSILON {
            return intersection;
        }

        let to_plane = self.point - ray.origin;
        let length = self.normal.dot(to_plane) / projection;
        if length < EPSILON || length >= intersection.length {
            return intersection;
        }

        Intersection {
            point: ray.at(length),
            length,
            normal: self.normal,
            primitive: Some(self.id),
            ..Intersection::new(length)
        }
    }

    /// A unit vector lying inside the plane, used to span the synthetic
    /// bounding square.
    fn right_vector(&self) -> Vec3 {
        let n = self.normal;
        let right = if n.x >= 1.0 || n.x <= -1.0 {
            Vec3::new(0.0, 1.0, 1.0)
        } else if n.y >= 1.0 || n.y <= -1.0 {
            Vec3::new(1.0, 0.0, 1.0)
        } else if n.z >= 1.0 || n.z <= -1.0 {
            Vec3::new(1.0, 1.0, 0.0)
        } else {
            // Normal is not axis-aligned; derive an in-plane axis directly.
            return self.normal.any_orthonormal_vector();
        };
        right.normalize()
    }

    /// Synthetic bounds: a large square around the anchor point, spanned by
    /// the axes orthogonal to the normal.
    pub fn bounding_box(&self) -> Aabb {
        let right = self.right_vector();
        Aabb::new(
            self.point - right * BOUNDS_EXTENT,
            self.point + right * BOUNDS_EXTENT,
        )
    }

    /// Signed distance from `point` to the plane.
    pub fn distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point - self.point)
    }

    /// Exact plane/box overlap: the box straddles the plane iff its extreme
    /// corners lie on opposite sides.
    pub fn intersects_box(&self, aabb: &Aabb) -> bool {
        let distance_max = self.distance(aabb.max);
        let distance_min = self.distance(aabb.min);
        (distance_max <= 0.0 && distance_min >= 0.0) || (distance_max >= 0.0 && distance_min <= 0.0)
    }
}
