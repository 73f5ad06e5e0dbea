//! Ember tracer - the query-side engine of the ember ray tracer.
//!
//! This crate provides:
//!
//! - **Accelerators**: `Naive<T>`, `RegularGrid<T>`, `Bvh<T>`, all answering
//!   closest-hit and any-hit queries over primitives they own
//! - **Sampling**: the process-lifetime shuffled Halton table
//! - **Driver**: the `Shader`, dispatching rays across the selected
//!   accelerator flavor and sampling lights through the `Shade` hook

mod bvh;
mod grid;
mod naive;
mod shader;
mod table;

pub use bvh::{Bvh, BvhNode};
pub use grid::RegularGrid;
pub use naive::Naive;
pub use shader::{AcceleratorKind, Shade, Shader, UnknownAcceleratorError};
pub use table::SampleTable;
