//! Light sources.
//!
//! A light is a primitive carrying a radiance material. Dispatch is a tagged
//! variant rather than open inheritance: the shader only ever needs the
//! radiance, a sampled position, a sampling reset, and an intersect.

use ember_math::Vec3;

use crate::intersection::Intersection;
use crate::material::Material;
use crate::primitive::{Hittable, Primitive};
use crate::ray::Ray;
use crate::sampling::Sampler;
use crate::shapes::Triangle;

/// A light source in the scene.
pub enum Light {
    Area(AreaLight),
    Point(PointLight),
}

impl Light {
    /// The radiance material the light emits with.
    pub fn radiance(&self) -> &Material {
        match self {
            Light::Area(light) => &light.radiance,
            Light::Point(light) => &light.radiance,
        }
    }

    /// A position on the light for direct-illumination sampling.
    pub fn position(&self) -> Vec3 {
        match self {
            Light::Area(light) => light.sample_position(),
            Light::Point(light) => light.position,
        }
    }

    /// Rewind the light's sample stream for a new frame.
    pub fn reset_sampling(&self) {
        if let Light::Area(light) = self {
            light.sampler.reset();
        }
    }

    /// Let an emissive primitive claim the closest hit.
    pub fn intersect<'a>(&'a self, intersection: Intersection<'a>, ray: &Ray) -> Intersection<'a> {
        match self {
            Light::Area(light) => light.intersect(intersection, ray),
            // A point has no surface to hit.
            Light::Point(_) => intersection,
        }
    }
}

/// An emissive triangle acting as a light source.
pub struct AreaLight {
    radiance: Material,
    sampler: Box<dyn Sampler>,
    triangle: Primitive<Triangle>,
}

impl AreaLight {
    pub fn new(radiance: Material, sampler: Box<dyn Sampler>, triangle: Primitive<Triangle>) -> Self {
        Self {
            radiance,
            sampler,
            triangle,
        }
    }

    /// Sample a point on the triangle, uniform in area.
    ///
    /// Two stream values become barycentric coordinates; points past the
    /// diagonal fold back into the triangle.
    pub fn sample_position(&self) -> Vec3 {
        let mut r = self.sampler.sample_1d();
        let mut s = self.sampler.sample_1d();

        if r + s >= 1.0 {
            r = 1.0 - r;
            s = 1.0 - s;
        }

        self.triangle.shape.vertex_a() + self.triangle.shape.edge_ab() * r
            + self.triangle.shape.edge_ac() * s
    }

    fn intersect<'a>(&'a self, intersection: Intersection<'a>, ray: &Ray) -> Intersection<'a> {
        let last = intersection.length;
        let hit = self.triangle.intersect(intersection, ray);
        if hit.length < last {
            Intersection {
                material: Some(&self.radiance),
                ..hit
            }
        } else {
            hit
        }
    }
}

/// A positional light with no surface.
pub struct PointLight {
    radiance: Material,
    position: Vec3,
}

impl PointLight {
    pub fn new(radiance: Material, position: Vec3) -> Self {
        Self { radiance, position }
    }
}
