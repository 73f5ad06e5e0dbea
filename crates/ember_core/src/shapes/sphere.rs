//! Sphere primitive.

use ember_math::{Aabb, Vec3};

use crate::intersection::{Intersection, PrimitiveId, EPSILON};
use crate::ray::Ray;

/// A sphere described by center and radius.
#[derive(Debug, Clone, Copy)]
pub struct Sphere {
    center: Vec3,
    radius: f32,
    id: PrimitiveId,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self {
            center,
            radius: radius.max(0.0),
            id: PrimitiveId::next(),
        }
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn id(&self) -> PrimitiveId {
        self.id
    }

    /// Closest-hit test: the smallest quadratic root inside
    /// `(EPSILON, intersection.length)`.
    pub fn intersect<'a>(&self, intersection: Intersection<'a>, ray: &Ray) -> Intersection<'a> {
        let oc = self.center - ray.origin;
        let a = ray.direction.length_squared();
        let h = ray.direction.dot(oc);
        let c = oc.length_squared() - self.radius * self.radius;

        let discriminant = h * h - a * c;
        if discriminant < 0.0 {
            return intersection;
        }

        let sqrt_d = discriminant.sqrt();

        // Nearest acceptable root; fall back to the far one when the origin
        // is inside the sphere.
        let mut root = (h - sqrt_d) / a;
        if root < EPSILON || root >= intersection.length {
            root = (h + sqrt_d) / a;
            if root < EPSILON || root >= intersection.length {
                return intersection;
            }
        }

        let point = ray.at(root);
        Intersection {
            point,
            length: root,
            normal: (point - self.center) / self.radius,
            primitive: Some(self.id),
            ..Intersection::new(root)
        }
    }

    pub fn bounding_box(&self) -> Aabb {
        let extent = Vec3::splat(self.radius);
        Aabb::new(self.center - extent, self.center + extent)
    }

    /// Exact sphere/box overlap via the closest point in the box.
    pub fn intersects_box(&self, aabb: &Aabb) -> bool {
        let closest = self.center.clamp(aabb.min, aabb.max);
        (closest - self.center).length_squared() <= self.radius * self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_hit() {
        let sphere = Sphere::new(Vec3::new(0.0, 0.0, -3.0), 1.0);
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), 0, None);

        let hit = sphere.intersect(Intersection::miss(), &ray);
        assert!((hit.length - 2.0).abs() < 1e-5);
        assert!((hit.normal - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn test_sphere_miss() {
        let sphere = Sphere::new(Vec3::new(0.0, 0.0, -3.0), 1.0);
        let ray = Ray::new(Vec3::ZERO, Vec3::Y, 0, None);

        let hit = sphere.intersect(Intersection::miss(), &ray);
        assert!(!hit.is_hit());
    }

    #[test]
    fn test_sphere_hit_from_inside_takes_far_root() {
        let sphere = Sphere::new(Vec3::ZERO, 2.0);
        let ray = Ray::new(Vec3::ZERO, Vec3::X, 0, None);

        let hit = sphere.intersect(Intersection::miss(), &ray);
        assert!((hit.length - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_sphere_respects_current_length() {
        let sphere = Sphere::new(Vec3::new(0.0, 0.0, -3.0), 1.0);
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), 0, None);

        let hit = sphere.intersect(Intersection::new(1.5), &ray);
        assert!(!hit.is_hit());
    }

    #[test]
    fn test_sphere_bounding_box() {
        let sphere = Sphere::new(Vec3::new(1.0, 2.0, 3.0), 0.5);
        let aabb = sphere.bounding_box();

        assert_eq!(aabb.min, Vec3::new(0.5, 1.5, 2.5));
        assert_eq!(aabb.max, Vec3::new(1.5, 2.5, 3.5));
    }

    #[test]
    fn test_sphere_box_overlap() {
        let sphere = Sphere::new(Vec3::ZERO, 1.0);

        assert!(sphere.intersects_box(&Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5))));
        assert!(sphere.intersects_box(&Aabb::new(Vec3::new(0.9, -0.1, -0.1), Vec3::splat(2.0))));
        assert!(!sphere.intersects_box(&Aabb::new(Vec3::splat(2.0), Vec3::splat(3.0))));
    }
}
