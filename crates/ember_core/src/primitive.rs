//! The primitive wrapper that attaches shading data to a shape, and the
//! query contract shared by every accelerated primitive.

use ember_math::{Aabb, Vec2, Vec3};

use crate::intersection::{Intersection, EPSILON};
use crate::ray::Ray;
use crate::shapes::{Plane, Sphere, Triangle};

/// Sentinel texture coordinates meaning "no texture".
pub const NO_TEXTURE_COORDS: Vec2 = Vec2::new(-1.0, -1.0);

/// Contract every accelerated primitive answers.
///
/// `intersect` may only ever decrease `intersection.length`; the record is
/// passed and returned by value, the way every query in this crate threads
/// its running closest hit.
pub trait Hittable {
    /// Closest-hit test bounded by the record's current length.
    fn intersect<'a>(&'a self, intersection: Intersection<'a>, ray: &Ray) -> Intersection<'a>;

    /// Bounds for accelerator placement.
    fn bounding_box(&self) -> Aabb;

    /// Overlap test against a voxel or node box.
    fn intersects_box(&self, aabb: &Aabb) -> bool;
}

/// Wraps a shape with a material palette index and, for triangles, the
/// per-vertex normals and texture coordinates used for interpolation.
#[derive(Debug, Clone)]
pub struct Primitive<T> {
    pub shape: T,
    pub material_index: Option<usize>,
    pub normals: [Vec3; 3],
    pub tex_coords: [Vec2; 3],
}

impl<T> Primitive<T> {
    pub fn new(shape: T) -> Self {
        Self {
            shape,
            material_index: None,
            normals: [Vec3::ZERO; 3],
            tex_coords: [NO_TEXTURE_COORDS; 3],
        }
    }

    pub fn with_material_index(mut self, material_index: usize) -> Self {
        self.material_index = Some(material_index);
        self
    }

    pub fn with_normals(mut self, normals: [Vec3; 3]) -> Self {
        self.normals = normals;
        self
    }

    pub fn with_tex_coords(mut self, tex_coords: [Vec2; 3]) -> Self {
        self.tex_coords = tex_coords;
        self
    }
}

impl Hittable for Primitive<Plane> {
    fn intersect<'a>(&'a self, intersection: Intersection<'a>, ray: &Ray) -> Intersection<'a> {
        let last = intersection.length;
        let hit = self.shape.intersect(intersection, ray);
        if hit.length < last {
            Intersection {
                material_index: self.material_index,
                ..hit
            }
        } else {
            hit
        }
    }

    fn bounding_box(&self) -> Aabb {
        self.shape.bounding_box()
    }

    fn intersects_box(&self, aabb: &Aabb) -> bool {
        self.shape.intersects_box(aabb)
    }
}

impl Hittable for Primitive<Sphere> {
    fn intersect<'a>(&'a self, intersection: Intersection<'a>, ray: &Ray) -> Intersection<'a> {
        let last = intersection.length;
        let hit = self.shape.intersect(intersection, ray);
        if hit.length < last {
            Intersection {
                material_index: self.material_index,
                ..hit
            }
        } else {
            hit
        }
    }

    fn bounding_box(&self) -> Aabb {
        self.shape.bounding_box()
    }

    fn intersects_box(&self, aabb: &Aabb) -> bool {
        self.shape.intersects_box(aabb)
    }
}

impl Hittable for Primitive<Triangle> {
    /// Möller-Trumbore through the shape, then barycentric interpolation of
    /// the per-vertex normals and texture coordinates.
    fn intersect<'a>(&'a self, intersection: Intersection<'a>, ray: &Ray) -> Intersection<'a> {
        let hit = match self.shape.hit(ray, intersection.length) {
            Some(hit) => hit,
            None => return intersection,
        };

        let w = 1.0 - hit.u - hit.v;
        let interpolated = self.normals[0] * w + self.normals[1] * hit.u + self.normals[2] * hit.v;
        let normal = if interpolated.length_squared() > EPSILON {
            interpolated.normalize()
        } else {
            self.shape.normal()
        };
        let tex_coords =
            self.tex_coords[0] * w + self.tex_coords[1] * hit.u + self.tex_coords[2] * hit.v;

        Intersection {
            point: ray.at(hit.t),
            length: hit.t,
            normal,
            primitive: Some(self.shape.id()),
            material_index: self.material_index,
            material: None,
            tex_coords,
        }
    }

    fn bounding_box(&self) -> Aabb {
        self.shape.bounding_box()
    }

    fn intersects_box(&self, aabb: &Aabb) -> bool {
        self.shape.intersects_box(aabb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_carries_material_index() {
        let sphere = Primitive::new(Sphere::new(Vec3::new(0.0, 0.0, -3.0), 1.0))
            .with_material_index(7);
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), 0, None);

        let hit = sphere.intersect(Intersection::miss(), &ray);
        assert_eq!(hit.material_index, Some(7));
    }

    #[test]
    fn test_primitive_miss_keeps_record() {
        let sphere = Primitive::new(Sphere::new(Vec3::new(0.0, 0.0, -3.0), 1.0))
            .with_material_index(7);
        let ray = Ray::new(Vec3::ZERO, Vec3::Y, 0, None);

        let hit = sphere.intersect(Intersection::miss(), &ray);
        assert!(hit.material_index.is_none());
        assert!(!hit.is_hit());
    }

    #[test]
    fn test_triangle_normal_interpolation() {
        let triangle = Triangle::new(
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(0.0, 1.0, 1.0),
        );
        // Smooth normals tilted toward +x at B, +y at C.
        let primitive = Primitive::new(triangle).with_normals([
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(1.0, 0.0, -1.0).normalize(),
            Vec3::new(0.0, 1.0, -1.0).normalize(),
        ]);

        // Hit exactly at vertex B's barycentric corner.
        let ray = Ray::new(Vec3::new(0.999, 0.0, 0.0), Vec3::Z, 0, None);
        let hit = primitive.intersect(Intersection::miss(), &ray);

        assert!(hit.is_hit());
        assert!((hit.normal.length() - 1.0).abs() < 1e-4);
        assert!(hit.normal.x > 0.5);
    }

    #[test]
    fn test_triangle_tex_coord_interpolation() {
        let triangle = Triangle::new(
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(0.0, 1.0, 1.0),
        );
        let primitive = Primitive::new(triangle)
            .with_normals([Vec3::new(0.0, 0.0, -1.0); 3])
            .with_tex_coords([Vec2::ZERO, Vec2::X, Vec2::Y]);

        let ray = Ray::new(Vec3::new(0.25, 0.25, 0.0), Vec3::Z, 0, None);
        let hit = primitive.intersect(Intersection::miss(), &ray);

        assert!((hit.tex_coords.x - 0.25).abs() < 1e-5);
        assert!((hit.tex_coords.y - 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_untextured_triangle_keeps_sentinel() {
        let triangle = Triangle::new(
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(0.0, 1.0, 1.0),
        );
        let primitive = Primitive::new(triangle);

        let ray = Ray::new(Vec3::new(0.25, 0.25, 0.0), Vec3::Z, 0, None);
        let hit = primitive.intersect(Intersection::miss(), &ray);

        // Barycentric weights sum to one, so the constant sentinel survives
        // interpolation.
        assert_eq!(hit.tex_coords, NO_TEXTURE_COORDS);
    }

    #[test]
    fn test_triangle_zero_normals_fall_back_to_face_normal() {
        let triangle = Triangle::new(
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(0.0, 1.0, 1.0),
        );
        let face_normal = triangle.normal();
        let primitive = Primitive::new(triangle);

        let ray = Ray::new(Vec3::new(0.25, 0.25, 0.0), Vec3::Z, 0, None);
        let hit = primitive.intersect(Intersection::miss(), &ray);

        assert!((hit.normal - face_normal).length() < 1e-5);
    }
}
