//! Bounding volume hierarchy with surface-area-heuristic splits.
//!
//! The tree is a flat array of nodes over a primitive vector reordered so
//! every leaf addresses a contiguous range. Construction and traversal are
//! both iterative over explicit stacks.

use std::cmp::Ordering;

use ember_core::{Hittable, Intersection, Ray};
use ember_math::{Aabb, Vec3};

/// Maximum primitives per leaf.
const MAX_LEAF_SIZE: usize = 2;

/// Depth of the explicit build and traversal stacks. Ample for any tree the
/// leaf limit and node bound can produce; pushes are checked regardless.
const STACK_DEPTH: usize = 512;

/// One node of the flattened tree.
///
/// A leaf has `num_primitives > 0` and addresses
/// `primitives[index_offset..index_offset + num_primitives]`; an inner node
/// has its children at `index_offset` and `index_offset + 1`.
#[derive(Debug, Clone, Copy)]
pub struct BvhNode {
    pub aabb: Aabb,
    pub index_offset: usize,
    pub num_primitives: usize,
}

impl BvhNode {
    fn sentinel() -> Self {
        Self {
            aabb: Aabb::EMPTY,
            index_offset: 0,
            num_primitives: 0,
        }
    }
}

/// Per-primitive data cached for construction.
struct BuildNode {
    aabb: Aabb,
    centroid: Vec3,
    original_index: usize,
}

/// A SAH-built bounding volume hierarchy owning its primitives.
pub struct Bvh<T> {
    nodes: Vec<BvhNode>,
    primitives: Vec<T>,
}

impl<T: Hittable + Clone> Bvh<T> {
    /// Build the hierarchy, consuming the primitive vector.
    ///
    /// An empty input produces a single sentinel node that every query
    /// passes through unchanged.
    pub fn new(primitives: Vec<T>) -> Self {
        if primitives.is_empty() {
            return Self {
                nodes: vec![BvhNode::sentinel()],
                primitives: Vec::new(),
            };
        }

        let count = primitives.len();
        let mut nodes = vec![BvhNode::sentinel(); 2 * count - 1];

        let mut build_nodes: Vec<BuildNode> = primitives
            .iter()
            .enumerate()
            .map(|(index, primitive)| {
                let aabb = primitive.bounding_box();
                BuildNode {
                    aabb,
                    centroid: aabb.centroid(),
                    original_index: index,
                }
            })
            .collect();

        // Three parallel stacks of pending ranges.
        let mut stack_node = [0usize; STACK_DEPTH];
        let mut stack_begin = [0usize; STACK_DEPTH];
        let mut stack_end = [0usize; STACK_DEPTH];
        let mut depth = 0usize;

        let mut current = 0usize;
        let mut begin = 0usize;
        let mut end = count;
        let mut max_node_index = 0usize;

        loop {
            let range = &mut build_nodes[begin..end];

            // Split along the widest spread of centroids.
            let centroid_bounds = range.iter().fold(Aabb::EMPTY, |bounds, node| {
                Aabb::surrounding(&bounds, &Aabb::new(node.centroid, node.centroid))
            });
            let axis = centroid_bounds.longest_axis();

            range.sort_unstable_by(|a, b| {
                a.centroid[axis]
                    .partial_cmp(&b.centroid[axis])
                    .unwrap_or(Ordering::Equal)
            });

            let union_box = range.iter().fold(Aabb::EMPTY, |bounds, node| {
                Aabb::surrounding(&bounds, &node.aabb)
            });

            let size = end - begin;
            if size <= MAX_LEAF_SIZE {
                nodes[current] = BvhNode {
                    aabb: union_box,
                    index_offset: begin,
                    num_primitives: size,
                };

                if depth == 0 {
                    break;
                }
                depth -= 1;
                current = stack_node[depth];
                begin = stack_begin[depth];
                end = stack_end[depth];
            } else {
                let boxes: Vec<Aabb> = range.iter().map(|node| node.aabb).collect();
                let split = split_index_sah(&boxes);

                let left = max_node_index + 1;
                let right = left + 1;
                max_node_index = right;

                nodes[current] = BvhNode {
                    aabb: union_box,
                    index_offset: left,
                    num_primitives: 0,
                };

                assert!(depth < STACK_DEPTH, "BVH build stack overflow");
                stack_node[depth] = right;
                stack_begin[depth] = begin + split;
                stack_end[depth] = end;
                depth += 1;

                current = left;
                end = begin + split;
            }
        }

        nodes.truncate(max_node_index + 1);
        nodes.shrink_to_fit();

        // Reorder the primitives to match the leaves' contiguous ranges.
        let primitives = build_nodes
            .iter()
            .map(|node| primitives[node.original_index].clone())
            .collect();

        Self { nodes, primitives }
    }
}

impl<T: Hittable> Bvh<T> {
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

        let mut stack = [0usize; STACK_DEPTH];
        let mut depth = 0usize;
        let mut index = 0usize;

        loop {
            let node = self.nodes[index];
            let mut descend = None;

            if node
                .aabb
                .intersects_ray(ray.origin, ray.direction, intersection.length)
            {
                if node.num_primitives > 0 {
                    let leaf =
                        &self.primitives[node.index_offset..node.index_offset + node.num_primitives];
                    for primitive in leaf {
                        let last = intersection.length;
                        intersection = primitive.intersect(intersection, ray);
                        if shadow && intersection.length < last {
                            return intersection;
                        }
                    }
                } else {
                    let left = node.index_offset;
                    let right = left + 1;
                    let hit_left = self.nodes[left].aabb.intersects_ray(
                        ray.origin,
                        ray.direction,
                        intersection.length,
                    );
                    let hit_right = self.nodes[right].aabb.intersects_ray(
                        ray.origin,
                        ray.direction,
                        intersection.length,
                    );

                    descend = match (hit_left, hit_right) {
                        (true, true) => {
                            assert!(depth < STACK_DEPTH, "BVH traversal stack overflow");
                            stack[depth] = right;
                            depth += 1;
                            Some(left)
                        }
                        (true, false) => Some(left),
                        (false, true) => Some(right),
                        (false, false) => None,
                    };
                }
            }

            match descend {
                Some(next) => index = next,
                None => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                    index = stack[depth];
                }
            }
        }

        intersection
    }
}

/// The surface-area-heuristic split position for a centroid-sorted run of
/// boxes: the `k` in `[1, len)` minimizing
/// `k * area(union of boxes[..k]) + (len - k) * area(union of boxes[k..])`,
/// smallest `k` on ties.
fn split_index_sah(boxes: &[Aabb]) -> usize {
    let count = boxes.len();
    let positions = count - 1;

    // Prefix areas of the left union.
    let mut left_area = vec![0.0_f32; positions];
    let mut left_box = boxes[0];
    left_area[0] = left_box.surface_area();
    for i in 1..positions {
        left_box = Aabb::surrounding(&left_box, &boxes[i]);
        left_area[i] = left_box.surface_area();
    }

    // Suffix areas of the right union.
    let mut right_area = vec![0.0_f32; positions];
    let mut right_box = boxes[count - 1];
    right_area[positions - 1] = right_box.surface_area();
    for i in (0..positions - 1).rev() {
        right_box = Aabb::surrounding(&right_box, &boxes[i + 1]);
        right_area[i] = right_box.surface_area();
    }

    let mut split_index = 1;
    let mut min_cost = left_area[0] + positions as f32 * right_area[0];
    for i in 1..positions {
        let split = i + 1;
        let cost = split as f32 * left_area[i] + (count - split) as f32 * right_area[i];
        if cost < min_cost {
            split_index = split;
            min_cost = cost;
        }
    }

    split_index
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::{Primitive, Sphere, Triangle, Vec3};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::naive::Naive;

    fn triangle_at(x: f32, y: f32, z: f32) -> Primitive<Triangle> {
        Primitive::new(Triangle::new(
            Vec3::new(x, y, z),
            Vec3::new(x + 1.0, y, z),
            Vec3::new(x, y + 1.0, z),
        ))
    }

    fn random_spheres(count: usize, seed: u64) -> Vec<Primitive<Sphere>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count)
            .map(|i| {
                let center = Vec3::new(
                    rng.gen_range(-10.0..10.0),
                    rng.gen_range(-10.0..10.0),
                    rng.gen_range(-10.0..10.0),
                );
                Primitive::new(Sphere::new(center, rng.gen_range(0.1..1.0)))
                    .with_material_index(i)
            })
            .collect()
    }

    #[test]
    fn test_empty_bvh_returns_record_unchanged() {
        let bvh: Bvh<Primitive<Triangle>> = Bvh::new(Vec::new());
        let ray = Ray::new(Vec3::ZERO, Vec3::Z, 0, None);

        let hit = bvh.trace(Intersection::miss(), &ray);
        assert!(!hit.is_hit());
        assert_eq!(hit.length, f32::INFINITY);
    }

    #[test]
    fn test_single_triangle_analytic_distance() {
        let bvh = Bvh::new(vec![triangle_at(0.0, 0.0, 1.0)]);
        let ray = Ray::new(Vec3::new(0.25, 0.25, 0.0), Vec3::Z, 0, None);

        let hit = bvh.trace(Intersection::miss(), &ray);
        assert!((hit.length - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_leaf_boxes_contain_their_primitives() {
        let bvh = Bvh::new(random_spheres(64, 7));

        for node in &bvh.nodes {
            if node.num_primitives == 0 {
                continue;
            }
            assert!(node.num_primitives <= MAX_LEAF_SIZE);
            for primitive in
                &bvh.primitives[node.index_offset..node.index_offset + node.num_primitives]
            {
                assert!(node.aabb.contains_box(&primitive.bounding_box()));
            }
        }
    }

    #[test]
    fn test_inner_boxes_are_the_union_of_their_children() {
        let bvh = Bvh::new(random_spheres(64, 11));

        for node in &bvh.nodes {
            if node.num_primitives > 0 {
                continue;
            }
            let left = &bvh.nodes[node.index_offset];
            let right = &bvh.nodes[node.index_offset + 1];
            // min/max folds are exact, so the union reproduces the parent
            // box bit for bit.
            assert_eq!(Aabb::surrounding(&left.aabb, &right.aabb), node.aabb);
        }
    }

    #[test]
    fn test_every_primitive_lands_in_exactly_one_leaf() {
        let count = 100;
        let bvh = Bvh::new(random_spheres(count, 13));

        let mut covered = vec![0usize; count];
        for node in &bvh.nodes {
            for index in node.index_offset..node.index_offset + node.num_primitives {
                covered[index] += 1;
            }
        }
        assert!(covered.iter().all(|&uses| uses == 1));
        assert!(bvh.nodes.len() <= 2 * count - 1);
    }

    #[test]
    fn test_bvh_matches_naive_closest_hit() {
        let spheres = random_spheres(200, 42);
        let naive = Naive::new(spheres.clone());
        let bvh = Bvh::new(spheres);

        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..500 {
            let origin = Vec3::new(
                rng.gen_range(-15.0..15.0),
                rng.gen_range(-15.0..15.0),
                rng.gen_range(-15.0..15.0),
            );
            let direction = Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            )
            .normalize();
            let ray = Ray::new(origin, direction, 0, None);

            let expected = naive.trace(Intersection::miss(), &ray);
            let actual = bvh.trace(Intersection::miss(), &ray);

            if expected.is_hit() {
                assert!(
                    (expected.length - actual.length).abs() < 1e-4,
                    "naive {} vs bvh {}",
                    expected.length,
                    actual.length
                );
            } else {
                assert!(!actual.is_hit());
            }
        }
    }

    #[test]
    fn test_shadow_trace_never_worsens_the_record() {
        let bvh = Bvh::new(random_spheres(50, 3));
        let mut rng = StdRng::seed_from_u64(4);

        for _ in 0..200 {
            let origin = Vec3::new(
                rng.gen_range(-15.0..15.0),
                rng.gen_range(-15.0..15.0),
                rng.gen_range(-15.0..15.0),
            );
            let direction = Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            )
            .normalize();
            let ray = Ray::new(origin, direction, 0, None);

            let bound = rng.gen_range(1.0..30.0);
            let hit = bvh.shadow_trace(Intersection::new(bound), &ray);
            assert!(hit.length <= bound);
        }
    }

    #[test]
    fn test_shadow_trace_stops_after_first_occluder() {
        // Two occluders stacked along +z; count how many tests a shadow
        // query performs by checking it reports the nearer-leaf hit and
        // leaves the record improved exactly once.
        let bvh = Bvh::new(vec![triangle_at(0.0, 0.0, 1.0), triangle_at(0.0, 0.0, 2.0)]);
        let ray = Ray::new(Vec3::new(0.25, 0.25, 0.0), Vec3::Z, 0, None);

        let hit = bvh.shadow_trace(Intersection::miss(), &ray);
        assert!(hit.is_hit());
        assert!(hit.length < 2.5);
    }

    #[test]
    fn test_degenerate_primitives_build_fine() {
        // Zero-area triangles are legal input.
        let degenerate = Primitive::new(Triangle::new(Vec3::ZERO, Vec3::ZERO, Vec3::ZERO));
        let bvh = Bvh::new(vec![
            degenerate.clone(),
            degenerate,
            triangle_at(0.0, 0.0, 1.0),
        ]);

        let ray = Ray::new(Vec3::new(0.25, 0.25, 0.0), Vec3::Z, 0, None);
        let hit = bvh.trace(Intersection::miss(), &ray);
        assert!((hit.length - 1.0).abs() < 1e-5);
    }
}
