//! Uniform-grid accelerator.
//!
//! The world bounds are voxelized into a fixed number of cells per axis;
//! each cell lists the primitives overlapping it. Queries walk the voxels
//! the ray pierces with a 3D-DDA, stopping as soon as the closest hit lies
//! before the current voxel's exit.

use ember_core::{Hittable, Intersection, Ray};
use ember_math::{Aabb, Vec3};

/// Minimum axis extent; a flat scene still gets non-degenerate voxels.
const MIN_EXTENT: f32 = 1.0e-4;

/// A uniform voxel grid owning its primitives.
pub struct RegularGrid<T> {
    aabb: Aabb,
    cell_size: Vec3,
    resolution: i32,
    cells: Vec<Vec<u32>>,
    primitives: Vec<T>,
}

impl<T: Hittable> RegularGrid<T> {
    /// Voxelize `aabb` into `resolution` cells per axis and distribute the
    /// primitives, refining AABB candidates with each shape's own overlap
    /// test.
    pub fn new(aabb: Aabb, resolution: usize, primitives: Vec<T>) -> Self {
        if primitives.is_empty() {
            return Self {
                aabb,
                cell_size: Vec3::ZERO,
                resolution: resolution as i32,
                cells: Vec::new(),
                primitives,
            };
        }

        let aabb = pad_degenerate_axes(aabb);
        let resolution_i = resolution as i32;
        let cell_size = (aabb.max - aabb.min) / resolution as f32;

        let mut cells = vec![Vec::new(); resolution * resolution * resolution];
        for (index, primitive) in primitives.iter().enumerate() {
            let bounds = primitive.bounding_box();
            let lo = cell_coords(&aabb, cell_size, resolution_i, bounds.min);
            let hi = cell_coords(&aabb, cell_size, resolution_i, bounds.max);

            for z in lo[2]..=hi[2] {
                for y in lo[1]..=hi[1] {
                    for x in lo[0]..=hi[0] {
                        let cell = [x, y, z];
                        let cell_box = cell_bounds(&aabb, cell_size, cell);
                        if primitive.intersects_box(&cell_box) {
                            cells[cell_index(resolution_i, cell)].push(index as u32);
                        }
                    }
                }
            }
        }

        Self {
            aabb,
            cell_size,
            resolution: resolution_i,
            cells,
            primitives,
        }
    }

    /// Closest-hit query.
    pub fn trace<'a>(&'a self, intersection: Intersection<'a>, ray: &Ray) -> Intersection<'a> {
        self.intersect(intersection, ray, false)
    }

    /// Any-hit query: returns as soon as any primitive improves the record.
    pub fn shadow_trace<'a>(
        &'a self,
        intersection: Intersection<'a>,
        ray: &Ray,
    ) -> Intersection<'a> {
        self.intersect(intersection, ray, true)
    }

    pub fn primitives(&self) -> &[T] {
        &self.primitives
    }

    fn intersect<'a>(
        &'a self,
        mut intersection: Intersection<'a>,
        ray: &Ray,
        shadow: bool,
    ) -> Intersection<'a> {
        if self.primitives.is_empty() {
            return intersection;
        }

        // Advance to the world box; a ray starting inside enters at zero.
        let t_entry = match ray_entry(&self.aabb, ray, intersection.length) {
            Some(t) => t,
            None => return intersection,
        };
        let entry_point = ray.at(t_entry);
        let mut cell = cell_coords(&self.aabb, self.cell_size, self.resolution, entry_point);

        // 3D-DDA setup: distance to the next voxel boundary and the stride
        // per voxel, each axis independent.
        let mut step = [0_i32; 3];
        let mut t_next = [f32::INFINITY; 3];
        let mut t_delta = [f32::INFINITY; 3];
        for axis in 0..3 {
            let direction = ray.direction[axis];
            if direction > 0.0 {
                let boundary =
                    self.aabb.min[axis] + (cell[axis] + 1) as f32 * self.cell_size[axis];
                step[axis] = 1;
                t_next[axis] = t_entry + (boundary - entry_point[axis]) / direction;
                t_delta[axis] = self.cell_size[axis] / direction;
            } else if direction < 0.0 {
                let boundary = self.aabb.min[axis] + cell[axis] as f32 * self.cell_size[axis];
                step[axis] = -1;
                t_next[axis] = t_entry + (boundary - entry_point[axis]) / direction;
                t_delta[axis] = -self.cell_size[axis] / direction;
            }
        }

        loop {
            for &index in &self.cells[cell_index(self.resolution, cell)] {
                let last = intersection.length;
                intersection = self.primitives[index as usize].intersect(intersection, ray);
                if shadow && intersection.length < last {
                    return intersection;
                }
            }

            // A hit inside this voxel cannot be beaten by later voxels.
            let t_exit = t_next[0].min(t_next[1]).min(t_next[2]);
            if intersection.length < t_exit {
                break;
            }

            let axis = if t_next[0] <= t_next[1] && t_next[0] <= t_next[2] {
                0
            } else if t_next[1] <= t_next[2] {
                1
            } else {
                2
            };

            // A degenerate direction never leaves its voxel.
            if step[axis] == 0 {
                break;
            }
            cell[axis] += step[axis];
            if cell[axis] < 0 || cell[axis] >= self.resolution {
                break;
            }
            t_next[axis] += t_delta[axis];
        }

        intersection
    }
}

/// Slab test returning the entry distance within `[0, max_length)`.
fn ray_entry(aabb: &Aabb, ray: &Ray, max_length: f32) -> Option<f32> {
    let mut t_min = 0.0_f32;
    let mut t_max = max_length;

    for axis in 0..3 {
        let inv = 1.0 / ray.direction[axis];
        let mut t0 = (aabb.min[axis] - ray.origin[axis]) * inv;
        let mut t1 = (aabb.max[axis] - ray.origin[axis]) * inv;
        if inv < 0.0 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_min = t0.max(t_min);
        t_max = t1.min(t_max);
        if t_max < t_min {
            return None;
        }
    }

    Some(t_min)
}

fn pad_degenerate_axes(aabb: Aabb) -> Aabb {
    let mut min = aabb.min;
    let mut max = aabb.max;
    for axis in 0..3 {
        if max[axis] - min[axis] < MIN_EXTENT {
            min[axis] -= MIN_EXTENT / 2.0;
            max[axis] += MIN_EXTENT / 2.0;
        }
    }
    Aabb { min, max }
}

/// The voxel containing `point`, clamped into the grid.
fn cell_coords(aabb: &Aabb, cell_size: Vec3, resolution: i32, point: Vec3) -> [i32; 3] {
    let mut coords = [0_i32; 3];
    for axis in 0..3 {
        let offset = (point[axis] - aabb.min[axis]) / cell_size[axis];
        coords[axis] = (offset.floor() as i32).clamp(0, resolution - 1);
    }
    coords
}

fn cell_bounds(aabb: &Aabb, cell_size: Vec3, cell: [i32; 3]) -> Aabb {
    let offset = Vec3::new(cell[0] as f32, cell[1] as f32, cell[2] as f32);
    let min = aabb.min + offset * cell_size;
    Aabb::new(min, min + cell_size)
}

fn cell_index(resolution: i32, cell: [i32; 3]) -> usize {
    (cell[0] + cell[1] * resolution + cell[2] * resolution * resolution) as usize
}
