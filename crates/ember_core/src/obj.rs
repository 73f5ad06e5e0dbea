//! Wavefront OBJ/MTL scene loading.
//!
//! Two phases: construction tokenizes the OBJ and MTL streams and pre-counts
//! the triangles they will produce; `fill_scene` then builds triangles and
//! area lights shape-by-shape in parallel, deduplicating materials into the
//! scene palette and caching textures by file name.

use std::io::{BufRead, Cursor, Read};
use std::sync::Mutex;

use ember_math::{Vec2, Vec3};
use rayon::prelude::*;
use thiserror::Error;

use crate::light::{AreaLight, Light};
use crate::material::{self, Material};
use crate::primitive::{Primitive, NO_TEXTURE_COORDS};
use crate::sampling::Sampler;
use crate::scene::Scene;
use crate::shapes::Triangle;
use crate::texture::TextureCache;

/// Errors that stop a load before any geometry is produced.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to tokenize OBJ stream: {0}")]
    Obj(#[from] tobj::LoadError),
}

pub type LoadResult<T> = Result<T, LoadError>;

/// Per-worker output of the parallel fill: triangles indexing a local
/// material palette, plus the lights the shape contributed.
#[derive(Default)]
struct ShapeBatch {
    triangles: Vec<Primitive<Triangle>>,
    lights: Vec<Light>,
    materials: Vec<Material>,
}

/// A tokenized OBJ/MTL pair, ready to fill a scene.
pub struct ObjLoader {
    models: Vec<tobj::Model>,
    materials: Vec<tobj::Material>,
    triangle_count: usize,
}

impl ObjLoader {
    /// Tokenize an OBJ stream together with its (possibly empty) MTL stream.
    ///
    /// A broken MTL stream is logged and treated as empty; the load still
    /// succeeds as long as the OBJ stream itself tokenizes.
    pub fn new(obj: &mut impl BufRead, mtl: &mut impl Read) -> LoadResult<Self> {
        let mut mtl_source = String::new();
        mtl.read_to_string(&mut mtl_source)?;

        let (models, materials) = tobj::load_obj_buf(
            obj,
            &tobj::LoadOptions {
                triangulate: false,
                single_index: false,
                ..Default::default()
            },
            |path| {
                log::debug!("tokenizing material library {}", path.display());
                tobj::load_mtl_buf(&mut Cursor::new(mtl_source.as_bytes()))
            },
        )?;

        let materials = materials.unwrap_or_else(|err| {
            log::error!("failed to tokenize MTL stream: {err}");
            Vec::new()
        });

        let triangle_count = models.iter().map(|model| count_triangles(&model.mesh)).sum();
        log::debug!(
            "tokenized {} shapes, {} materials, {} triangles",
            models.len(),
            materials.len(),
            triangle_count
        );

        Ok(Self {
            models,
            materials,
            triangle_count,
        })
    }

    /// Number of triangles `fill_scene` will produce, counting emissive
    /// faces that become area lights.
    pub fn triangle_count(&self) -> usize {
        self.triangle_count
    }

    /// Build triangles and area lights into `scene`.
    ///
    /// Shapes are processed in parallel, each worker producing a batch with
    /// a local material palette; a sequential reducer deduplicates the
    /// palettes into the scene and re-bases triangle material indices.
    /// `make_sampler` supplies each area light with its own sample stream.
    pub fn fill_scene(
        &self,
        scene: &mut Scene,
        make_sampler: impl Fn() -> Box<dyn Sampler> + Send + Sync,
        textures: &mut TextureCache,
    ) {
        let textures = Mutex::new(textures);
        let make_sampler: &(dyn Fn() -> Box<dyn Sampler> + Send + Sync) = &make_sampler;

        let batches: Vec<ShapeBatch> = self
            .models
            .par_iter()
            .map(|model| self.fill_shape(&model.mesh, make_sampler, &textures))
            .collect();

        let base_triangles = scene.triangles.len();
        let mut emissive = 0;
        for batch in batches {
            let remap: Vec<usize> = batch
                .materials
                .into_iter()
                .map(|material| scene.resolve_material(material))
                .collect();

            for mut triangle in batch.triangles {
                triangle.material_index = triangle.material_index.map(|local| remap[local]);
                scene.triangles.push(triangle);
            }

            emissive += batch.lights.len();
            scene.lights.extend(batch.lights);
        }

        let produced = scene.triangles.len() - base_triangles;
        assert_eq!(
            produced + emissive,
            self.triangle_count,
            "triangle count after scene fill does not match the pre-count"
        );

        log::info!("total triangles loaded: {produced}");
        log::info!("total lights loaded: {emissive}");
        log::info!("total materials loaded: {}", scene.materials.len());
    }

    fn fill_shape(
        &self,
        mesh: &tobj::Mesh,
        make_sampler: &(dyn Fn() -> Box<dyn Sampler> + Send + Sync),
        textures: &Mutex<&mut TextureCache>,
    ) -> ShapeBatch {
        let mut batch = ShapeBatch::default();

        // A mesh of nothing but triangles may omit arities entirely.
        let fallback_arities;
        let arities: &[u32] = if mesh.face_arities.is_empty() {
            fallback_arities = vec![3; mesh.indices.len() / 3];
            &fallback_arities
        } else {
            &mesh.face_arities
        };

        let mut index_offset = 0;
        for &arity in arities {
            let arity = arity as usize;
            if arity % 3 != 0 {
                log::warn!("skipping face with {arity} vertices (not a multiple of 3)");
                index_offset += arity;
                continue;
            }

            // A face with 3k vertices is read as k independent triangles.
            for vertex in (0..arity).step_by(3) {
                self.fill_face(mesh, index_offset + vertex, make_sampler, textures, &mut batch);
            }

            index_offset += arity;
        }

        batch
    }

    fn fill_face(
        &self,
        mesh: &tobj::Mesh,
        offset: usize,
        make_sampler: &(dyn Fn() -> Box<dyn Sampler> + Send + Sync),
        textures: &Mutex<&mut TextureCache>,
        batch: &mut ShapeBatch,
    ) {
        let vertices = load_vertices(mesh, offset);
        let normals = load_normals(mesh, offset, &vertices);

        let (material, tex_coords) = match mesh.material_id {
            Some(id) if id < self.materials.len() => {
                self.convert_material(mesh, offset, id, textures)
            }
            _ => (vertex_color_material(mesh, offset), [NO_TEXTURE_COORDS; 3]),
        };

        let triangle = Primitive::new(Triangle::new(vertices[0], vertices[1], vertices[2]))
            .with_normals(normals)
            .with_tex_coords(tex_coords);

        if material.has_emission() {
            let light = AreaLight::new(material, make_sampler(), triangle);
            batch.lights.push(Light::Area(light));
        } else {
            let local_index = material::find_or_insert(&mut batch.materials, material);
            batch.triangles.push(triangle.with_material_index(local_index));
        }
    }

    /// Translate a tokenized MTL material, fetching its diffuse texture when
    /// the mesh carries texture coordinates.
    fn convert_material(
        &self,
        mesh: &tobj::Mesh,
        offset: usize,
        id: usize,
        textures: &Mutex<&mut TextureCache>,
    ) -> (Material, [Vec2; 3]) {
        let mat = &self.materials[id];

        let diffuse = Vec3::from(mat.diffuse);
        let specular = Vec3::from(mat.specular);
        let transmittance = vec3_param(mat, &["Tf", "Kt"]) * (1.0 - mat.dissolve);
        let emission = clamp_color(vec3_param(mat, &["Ke"]));

        let mut material = Material::new(
            diffuse,
            specular,
            transmittance,
            mat.optical_density,
            emission,
        );
        let mut tex_coords = [NO_TEXTURE_COORDS; 3];

        let has_tex_coords = !mesh.texcoords.is_empty() && !mesh.texcoord_indices.is_empty();
        if !mat.diffuse_texture.is_empty() && has_tex_coords {
            let texture = textures.lock().unwrap().fetch(&mat.diffuse_texture);
            if texture.is_valid() {
                tex_coords = load_tex_coords(mesh, offset);
            }
            material = material.with_texture(texture);
        }

        (material, tex_coords)
    }
}

/// Triangles a mesh will produce: `arity / 3` per face whose vertex count is
/// a multiple of 3, other faces skipped.
fn count_triangles(mesh: &tobj::Mesh) -> usize {
    if mesh.face_arities.is_empty() {
        return mesh.indices.len() / 3;
    }

    mesh.face_arities
        .iter()
        .map(|&arity| arity as usize)
        .filter(|arity| arity % 3 == 0)
        .map(|arity| arity / 3)
        .sum()
}

/// The face's vertex triple, mirrored on x to the renderer's handedness.
fn load_vertices(mesh: &tobj::Mesh, offset: usize) -> [Vec3; 3] {
    let mut vertices = [Vec3::ZERO; 3];
    for (slot, vertex) in vertices.iter_mut().enumerate() {
        let index = mesh.indices[offset + slot] as usize;
        *vertex = Vec3::new(
            -mesh.positions[3 * index],
            mesh.positions[3 * index + 1],
            mesh.positions[3 * index + 2],
        );
    }
    vertices
}

/// Per-vertex normals (mirrored on x), or the face normal when the stream
/// has none.
fn load_normals(mesh: &tobj::Mesh, offset: usize, vertices: &[Vec3; 3]) -> [Vec3; 3] {
    if mesh.normals.is_empty() || mesh.normal_indices.is_empty() {
        let normal = (vertices[2] - vertices[0])
            .cross(vertices[1] - vertices[0])
            .normalize();
        return [normal; 3];
    }

    let mut normals = [Vec3::ZERO; 3];
    for (slot, normal) in normals.iter_mut().enumerate() {
        let index = mesh.normal_indices[offset + slot] as usize;
        *normal = Vec3::new(
            -mesh.normals[3 * index],
            mesh.normals[3 * index + 1],
            mesh.normals[3 * index + 2],
        );
    }
    normals
}

fn load_tex_coords(mesh: &tobj::Mesh, offset: usize) -> [Vec2; 3] {
    let mut coords = [NO_TEXTURE_COORDS; 3];
    for (slot, coord) in coords.iter_mut().enumerate() {
        let index = mesh.texcoord_indices[offset + slot] as usize;
        let raw = Vec2::new(mesh.texcoords[2 * index], mesh.texcoords[2 * index + 1]);
        *coord = wrap_tex_coord(raw);
    }
    coords
}

/// OBJ repeat addressing: wrap coordinates into `[0, 1)`.
fn wrap_tex_coord(coord: Vec2) -> Vec2 {
    coord - coord.floor()
}

/// Material for a face without any MTL reference: the first vertex's color
/// (white when the OBJ carries no color extension) as plain diffuse.
fn vertex_color_material(mesh: &tobj::Mesh, offset: usize) -> Material {
    let diffuse = if mesh.vertex_color.is_empty() {
        Vec3::ONE
    } else {
        let index = mesh.indices[offset] as usize;
        Vec3::new(
            mesh.vertex_color[3 * index],
            mesh.vertex_color[3 * index + 1],
            mesh.vertex_color[3 * index + 2],
        )
    };

    Material::new(diffuse, Vec3::ZERO, Vec3::ZERO, 1.0, Vec3::ZERO)
}

/// Read an `r g b` statement the tokenizer leaves among the unknown
/// parameters (`Tf`, `Kt`, `Ke`). A lone value is broadcast; anything else
/// reads as zero.
fn vec3_param(material: &tobj::Material, keys: &[&str]) -> Vec3 {
    for key in keys {
        if let Some(value) = material.unknown_param.get(*key) {
            let parts: Vec<f32> = value
                .split_whitespace()
                .filter_map(|part| part.parse::<f32>().ok())
                .collect();
            match parts.as_slice() {
                [single] => return Vec3::splat(*single),
                [r, g, b, ..] => return Vec3::new(*r, *g, *b),
                _ => {}
            }
        }
    }
    Vec3::ZERO
}

/// Scale a color into LDR range: divide by the max component when it
/// exceeds 1, leave it untouched otherwise.
fn clamp_color(color: Vec3) -> Vec3 {
    let max = color.max_element();
    if max > 1.0 {
        color / max
    } else {
        color
    }
}
