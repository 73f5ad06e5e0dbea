//! Triangle primitive.
//!
//! Uses the Möller-Trumbore algorithm for ray-triangle intersection, with
//! both facings accepted.

use ember_math::{Aabb, Vec3};

use crate::intersection::{Intersection, PrimitiveId, EPSILON};
use crate::ray::Ray;

/// Barycentric hit on a triangle.
#[derive(Debug, Clone, Copy)]
pub struct TriangleHit {
    /// Hit distance along the ray.
    pub t: f32,
    /// Barycentric weight of vertex B.
    pub u: f32,
    /// Barycentric weight of vertex C.
    pub v: f32,
}

/// A triangle stored as one vertex and its two edge vectors.
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    a: Vec3,
    ab: Vec3,
    ac: Vec3,
    id: PrimitiveId,
}

impl Triangle {
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self {
            a,
            ab: b - a,
            ac: c - a,
            id: PrimitiveId::next(),
        }
    }

    pub fn vertex_a(&self) -> Vec3 {
        self.a
    }

    pub fn vertex_b(&self) -> Vec3 {
        self.a + self.ab
    }

    pub fn vertex_c(&self) -> Vec3 {
        self.a + self.ac
    }

    pub fn edge_ab(&self) -> Vec3 {
        self.ab
    }

    pub fn edge_ac(&self) -> Vec3 {
        self.ac
    }

    pub fn id(&self) -> PrimitiveId {
        self.id
    }

    /// Geometric face normal, `normalize(AC x AB)`.
    pub fn normal(&self) -> Vec3 {
        self.ac.cross(self.ab).normalize()
    }

    /// Möller-Trumbore intersection, returning barycentric coordinates for
    /// interpolation by the wrapping primitive. Backfaces are accepted.
    pub fn hit(&self, ray: &Ray, max_length: f32) -> Option<TriangleHit> {
        let h = ray.direction.cross(self.ac);
        let det = self.ab.dot(h);

        // Parallel to the triangle plane (either facing is fine otherwise).
        if det.abs() < EPSILON {
            return None;
        }

        let inv_det = 1.0 / det;
        let s = ray.origin - self.a;
        let u = inv_det * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(self.ab);
        let v = inv_det * ray.direction.dot(q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = inv_det * self.ac.dot(q);
        if t < EPSILON || t >= max_length {
            return None;
        }

        Some(TriangleHit { t, u, v })
    }

    /// Closest-hit test carrying the geometric normal.
    pub fn intersect<'a>(&self, intersection: Intersection<'a>, ray: &Ray) -> Intersection<'a> {
        match self.hit(ray, intersection.length) {
            Some(hit) => Intersection {
                point: ray.at(hit.t),
                length: hit.t,
                normal: self.normal(),
                primitive: Some(self.id),
                ..Intersection::new(hit.t)
            },
            None => intersection,
        }
    }

    pub fn bounding_box(&self) -> Aabb {
        let b = self.vertex_b();
        let c = self.vertex_c();
        Aabb::new(self.a.min(b).min(c), self.a.max(b).max(c))
    }

    /// Conservative triangle/box overlap via the triangle's bounds.
    pub fn intersects_box(&self, aabb: &Aabb) -> bool {
        aabb.overlaps(&self.bounding_box())
    }
}
