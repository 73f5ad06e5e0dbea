// Re-export glam for convenience
pub use glam::*;

mod aabb;
pub use aabb::Aabb;
