//! Ember core - the scene-side model of the ember ray tracer.
//!
//! This crate provides:
//!
//! - **Rays and intersections**: `Ray`, `Intersection`, `PrimitiveId`
//! - **Shapes**: `Plane`, `Sphere`, `Triangle` and the `Primitive<T>` wrapper
//! - **Assets**: `Material`, `Texture`, `TextureCache`
//! - **Lights**: `Light` (area and point variants) with injectable samplers
//! - **Scene assembly**: `Scene` and the parallel OBJ/MTL loader

pub mod intersection;
pub mod light;
pub mod material;
pub mod obj;
pub mod primitive;
pub mod ray;
pub mod sampling;
pub mod scene;
pub mod shapes;
pub mod texture;

pub use intersection::{Intersection, PrimitiveId, EPSILON};
pub use light::{AreaLight, Light, PointLight};
pub use material::Material;
pub use obj::{LoadError, LoadResult, ObjLoader};
pub use primitive::{Hittable, Primitive, NO_TEXTURE_COORDS};
pub use ray::Ray;
pub use sampling::{halton, HaltonSampler, Sampler};
pub use scene::Scene;
pub use shapes::{Plane, Sphere, Triangle, TriangleHit};
pub use texture::{Texture, TextureCache, TextureError, TextureResult};

/// Re-export the math types used across the crate boundary.
pub use ember_math::{Aabb, Vec2, Vec3};
