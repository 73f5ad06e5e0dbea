//! The shading driver.
//!
//! Owns the selected accelerator flavor (one instance per primitive shape),
//! the scene's lights and material palette, and the shared sample table.
//! The surface shading equation itself is external: the driver calls the
//! `Shade` hook with the closest hit and propagates its verdict.

use std::f32::consts::TAU;
use std::str::FromStr;

use ember_core::{
    Intersection, Light, Material, Plane, Primitive, Ray, Scene, Sphere, Triangle, Vec3,
};
use thiserror::Error;

use crate::bvh::Bvh;
use crate::grid::RegularGrid;
use crate::naive::Naive;
use crate::table::SampleTable;

/// Cells per axis of the regular-grid flavor.
const GRID_RESOLUTION: usize = 32;

/// The acceleration structure a shader run is configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceleratorKind {
    None,
    Naive,
    RegularGrid,
    Bvh,
}

#[derive(Error, Debug)]
#[error("unknown accelerator name: {0}")]
pub struct UnknownAcceleratorError(String);

impl FromStr for AcceleratorKind {
    type Err = UnknownAcceleratorError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "none" => Ok(Self::None),
            "naive" => Ok(Self::Naive),
            "regular-grid" | "grid" => Ok(Self::RegularGrid),
            "bvh" => Ok(Self::Bvh),
            other => Err(UnknownAcceleratorError(other.to_string())),
        }
    }
}

/// The selected flavor with its three per-shape accelerators; the other
/// flavors simply do not exist.
enum AcceleratorSet {
    None,
    Naive {
        planes: Naive<Primitive<Plane>>,
        spheres: Naive<Primitive<Sphere>>,
        triangles: Naive<Primitive<Triangle>>,
    },
    RegularGrid {
        planes: RegularGrid<Primitive<Plane>>,
        spheres: RegularGrid<Primitive<Sphere>>,
        triangles: RegularGrid<Primitive<Triangle>>,
    },
    Bvh {
        planes: Bvh<Primitive<Plane>>,
        spheres: Bvh<Primitive<Sphere>>,
        triangles: Bvh<Primitive<Triangle>>,
    },
}

/// The external shading equation.
///
/// Receives the driver itself so it can cast shadow rays and draw samples;
/// returns whether a color was produced.
pub trait Shade: Send + Sync {
    fn shade(
        &self,
        shader: &Shader,
        rgb: &mut Vec3,
        intersection: &Intersection<'_>,
        ray: &Ray,
    ) -> bool;
}

/// Dispatches rays across the configured accelerators and the scene lights.
pub struct Shader {
    accelerators: AcceleratorSet,
    lights: Vec<Light>,
    materials: Vec<Material>,
    samples_per_light: u32,
    samples: SampleTable,
}

impl Shader {
    /// Consume the scene into the chosen accelerator flavor.
    pub fn new(scene: Scene, samples_per_light: u32, kind: AcceleratorKind) -> Self {
        let Scene {
            planes,
            spheres,
            triangles,
            lights,
            materials,
        } = scene;

        log::debug!(
            "building {kind:?} accelerators over {} planes, {} spheres, {} triangles",
            planes.len(),
            spheres.len(),
            triangles.len()
        );

        let accelerators = match kind {
            AcceleratorKind::None => AcceleratorSet::None,
            AcceleratorKind::Naive => AcceleratorSet::Naive {
                planes: Naive::new(planes),
                spheres: Naive::new(spheres),
                triangles: Naive::new(triangles),
            },
            AcceleratorKind::RegularGrid => {
                let plane_bounds = Scene::bounds(&planes);
                let sphere_bounds = Scene::bounds(&spheres);
                let triangle_bounds = Scene::bounds(&triangles);
                AcceleratorSet::RegularGrid {
                    planes: RegularGrid::new(plane_bounds, GRID_RESOLUTION, planes),
                    spheres: RegularGrid::new(sphere_bounds, GRID_RESOLUTION, spheres),
                    triangles: RegularGrid::new(triangle_bounds, GRID_RESOLUTION, triangles),
                }
            }
            AcceleratorKind::Bvh => AcceleratorSet::Bvh {
                planes: Bvh::new(planes),
                spheres: Bvh::new(spheres),
                triangles: Bvh::new(triangles),
            },
        };

        Self {
            accelerators,
            lights,
            materials,
            samples_per_light,
            samples: SampleTable::new(),
        }
    }

    /// Closest-hit dispatch followed by the shading hook.
    ///
    /// Lights are traced after the accelerators so emissive primitives can
    /// claim the hit. Returns the hook's verdict, or false on a miss.
    pub fn ray_trace(&self, shade: &dyn Shade, rgb: &mut Vec3, ray: &Ray) -> bool {
        let mut intersection = Intersection::miss();
        let miss_length = intersection.length;

        intersection = self.trace(intersection, ray);
        intersection = self.trace_lights(intersection, ray);

        intersection.length < miss_length && shade.shade(self, rgb, &intersection, ray)
    }

    /// Any-hit dispatch: true iff something improved the record.
    pub fn shadow_trace<'a>(&'a self, intersection: Intersection<'a>, ray: &Ray) -> bool {
        let last = intersection.length;
        let intersection = match &self.accelerators {
            AcceleratorSet::None => intersection,
            AcceleratorSet::Naive {
                planes,
                spheres,
                triangles,
            } => {
                let intersection = planes.shadow_trace(intersection, ray);
                let intersection = spheres.shadow_trace(intersection, ray);
                triangles.shadow_trace(intersection, ray)
            }
            AcceleratorSet::RegularGrid {
                planes,
                spheres,
                triangles,
            } => {
                let intersection = planes.shadow_trace(intersection, ray);
                let intersection = spheres.shadow_trace(intersection, ray);
                triangles.shadow_trace(intersection, ray)
            }
            AcceleratorSet::Bvh {
                planes,
                spheres,
                triangles,
            } => {
                let intersection = planes.shadow_trace(intersection, ray);
                let intersection = spheres.shadow_trace(intersection, ray);
                triangles.shadow_trace(intersection, ray)
            }
        };
        intersection.length < last
    }

    fn trace<'a>(&'a self, intersection: Intersection<'a>, ray: &Ray) -> Intersection<'a> {
        match &self.accelerators {
            AcceleratorSet::None => intersection,
            AcceleratorSet::Naive {
                planes,
                spheres,
                triangles,
            } => {
                let intersection = planes.trace(intersection, ray);
                let intersection = spheres.trace(intersection, ray);
                triangles.trace(intersection, ray)
            }
            AcceleratorSet::RegularGrid {
                planes,
                spheres,
                triangles,
            } => {
                let intersection = planes.trace(intersection, ray);
                let intersection = spheres.trace(intersection, ray);
                triangles.trace(intersection, ray)
            }
            AcceleratorSet::Bvh {
                planes,
                spheres,
                triangles,
            } => {
                let intersection = planes.trace(intersection, ray);
                let intersection = spheres.trace(intersection, ray);
                triangles.trace(intersection, ray)
            }
        }
    }

    /// Let every light's emissive primitive contend for the closest hit.
    fn trace_lights<'a>(
        &'a self,
        mut intersection: Intersection<'a>,
        ray: &Ray,
    ) -> Intersection<'a> {
        for light in &self.lights {
            intersection = light.intersect(intersection, ray);
        }
        intersection
    }

    /// A unit direction in the normal's hemisphere, distributed with
    /// density `cos(theta) / pi`, fed by two consecutive table values.
    pub fn cosine_sample_hemisphere(&self, normal: Vec3) -> Vec3 {
        let u1 = self.samples.next_value();
        let u2 = self.samples.next_value();

        let phi = TAU * u1;
        let cos_theta = u2.sqrt();

        // Orthonormal frame around the normal.
        let helper = if normal.x.abs() > 0.1 { Vec3::Y } else { Vec3::X };
        let u = helper.cross(normal).normalize();
        let v = normal.cross(u);

        let direction = u * (phi.cos() * cos_theta)
            + v * (phi.sin() * cos_theta)
            + normal * (1.0 - u2).sqrt();
        direction.normalize()
    }

    /// A uniform light index drawn from the table. The `0.99999` factor
    /// keeps the floor strictly below the light count.
    pub fn sample_light_index(&self) -> usize {
        let value = self.samples.next_value();
        (value * self.lights.len() as f32 * 0.99999) as usize
    }

    /// Restart every light's per-frame quasi-random sequence.
    pub fn reset_sampling(&self) {
        for light in &self.lights {
            light.reset_sampling();
        }
    }

    pub fn planes(&self) -> &[Primitive<Plane>] {
        match &self.accelerators {
            AcceleratorSet::None => &[],
            AcceleratorSet::Naive { planes, .. } => planes.primitives(),
            AcceleratorSet::RegularGrid { planes, .. } => planes.primitives(),
            AcceleratorSet::Bvh { planes, .. } => planes.primitives(),
        }
    }

    pub fn spheres(&self) -> &[Primitive<Sphere>] {
        match &self.accelerators {
            AcceleratorSet::None => &[],
            AcceleratorSet::Naive { spheres, .. } => spheres.primitives(),
            AcceleratorSet::RegularGrid { spheres, .. } => spheres.primitives(),
            AcceleratorSet::Bvh { spheres, .. } => spheres.primitives(),
        }
    }

    pub fn triangles(&self) -> &[Primitive<Triangle>] {
        match &self.accelerators {
            AcceleratorSet::None => &[],
            AcceleratorSet::Naive { triangles, .. } => triangles.primitives(),
            AcceleratorSet::RegularGrid { triangles, .. } => triangles.primitives(),
            AcceleratorSet::Bvh { triangles, .. } => triangles.primitives(),
        }
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn samples_per_light(&self) -> u32 {
        self.samples_per_light
    }
}
