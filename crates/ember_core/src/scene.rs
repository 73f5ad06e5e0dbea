//! The assembled scene: primitives, lights, and the material palette.

use ember_math::Aabb;

use crate::light::Light;
use crate::material::{self, Material};
use crate::primitive::{Hittable, Primitive};
use crate::shapes::{Plane, Sphere, Triangle};

/// Everything a shader needs to trace: per-shape primitive vectors, lights,
/// and the deduplicated material palette primitives index into.
///
/// Append-only while loading; the shader consumes the vectors by move, so a
/// scene cannot be copied once handed off.
#[derive(Default)]
pub struct Scene {
    pub planes: Vec<Primitive<Plane>>,
    pub spheres: Vec<Primitive<Sphere>>,
    pub triangles: Vec<Primitive<Triangle>>,
    pub lights: Vec<Light>,
    pub materials: Vec<Material>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Palette index for `material`, reusing an equal entry when present.
    pub fn resolve_material(&mut self, material: Material) -> usize {
        material::find_or_insert(&mut self.materials, material)
    }

    /// The union bounds of a primitive vector; `Aabb::EMPTY` when it is
    /// empty.
    pub fn bounds<T: Hittable>(primitives: &[T]) -> Aabb {
        primitives.iter().fold(Aabb::EMPTY, |bounds, primitive| {
            Aabb::surrounding(&bounds, &primitive.bounding_box())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_math::Vec3;

    #[test]
    fn test_bounds_of_spheres() {
        let spheres = vec![
            Primitive::new(Sphere::new(Vec3::ZERO, 1.0)),
            Primitive::new(Sphere::new(Vec3::new(4.0, 0.0, 0.0), 2.0)),
        ];

        let bounds = Scene::bounds(&spheres);
        assert_eq!(bounds.min, Vec3::new(-1.0, -2.0, -2.0));
        assert_eq!(bounds.max, Vec3::new(6.0, 2.0, 2.0));
    }

    #[test]
    fn test_bounds_of_empty_vector() {
        let triangles: Vec<Primitive<Triangle>> = Vec::new();
        let bounds = Scene::bounds(&triangles);
        assert!(bounds.min.x > bounds.max.x);
    }

    #[test]
    fn test_resolve_material_reuses_palette_entries() {
        let mut scene = Scene::new();
        let grey = Material::new(Vec3::splat(0.5), Vec3::ZERO, Vec3::ZERO, 1.0, Vec3::ZERO);

        let first = scene.resolve_material(grey.clone());
        let second = scene.resolve_material(grey);

        assert_eq!(first, second);
        assert_eq!(scene.materials.len(), 1);
    }
}
