//! Surface materials and the palette deduplication helper.

use std::sync::Arc;

use ember_math::Vec3;

use crate::texture::Texture;

/// A surface material.
///
/// Equality is structural; the scene palette collapses equal materials to a
/// single index. Texture handles compare by pointer, which is sound because
/// the texture cache hands out one `Arc` per path.
#[derive(Debug, Clone)]
pub struct Material {
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub transmittance: Vec3,
    pub refractive_index: f32,
    pub emission: Vec3,
    pub texture: Option<Arc<Texture>>,
}

impl Material {
    pub fn new(
        diffuse: Vec3,
        specular: Vec3,
        transmittance: Vec3,
        refractive_index: f32,
        emission: Vec3,
    ) -> Self {
        Self {
            diffuse,
            specular,
            transmittance,
            refractive_index,
            emission,
            texture: None,
        }
    }

    pub fn with_texture(mut self, texture: Arc<Texture>) -> Self {
        self.texture = Some(texture);
        self
    }

    /// Whether any emission component is positive (the material is a light
    /// source).
    pub fn has_emission(&self) -> bool {
        self.emission.x > 0.0 || self.emission.y > 0.0 || self.emission.z > 0.0
    }

    pub fn has_texture(&self) -> bool {
        self.texture.as_ref().is_some_and(|texture| texture.is_valid())
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::ZERO, Vec3::ZERO, 1.0, Vec3::ZERO)
    }
}

impl PartialEq for Material {
    fn eq(&self, other: &Self) -> bool {
        let textures_match = match (&self.texture, &other.texture) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        textures_match
            && self.diffuse == other.diffuse
            && self.specular == other.specular
            && self.transmittance == other.transmittance
            && self.refractive_index == other.refractive_index
            && self.emission == other.emission
    }
}

/// Find `material` in `palette` by structural equality, inserting it when
/// absent. Returns the palette index either way.
pub fn find_or_insert(palette: &mut Vec<Material>, material: Material) -> usize {
    match palette.iter().position(|existing| *existing == material) {
        Some(index) => index,
        None => {
            palette.push(material);
            palette.len() - 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_structural_equality() {
        let a = Material::new(Vec3::ONE, Vec3::ZERO, Vec3::ZERO, 1.5, Vec3::ZERO);
        let b = Material::new(Vec3::ONE, Vec3::ZERO, Vec3::ZERO, 1.5, Vec3::ZERO);
        let c = Material::new(Vec3::ONE, Vec3::ZERO, Vec3::ZERO, 1.0, Vec3::ZERO);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_material_texture_identity() {
        let texture = Arc::new(Texture::placeholder("wood.png"));
        let base = Material::default();

        let a = base.clone().with_texture(texture.clone());
        let b = base.clone().with_texture(texture);
        let c = base.clone().with_texture(Arc::new(Texture::placeholder("wood.png")));

        assert_eq!(a, b);
        assert_ne!(a, c); // distinct allocations do not collapse
        assert_ne!(a, base);
    }

    #[test]
    fn test_has_emission() {
        let dark = Material::default();
        let lit = Material::new(Vec3::ZERO, Vec3::ZERO, Vec3::ZERO, 1.0, Vec3::new(0.0, 2.0, 0.0));

        assert!(!dark.has_emission());
        assert!(lit.has_emission());
    }

    #[test]
    fn test_find_or_insert_dedupes() {
        let mut palette = Vec::new();
        let red = Material::new(Vec3::X, Vec3::ZERO, Vec3::ZERO, 1.0, Vec3::ZERO);
        let blue = Material::new(Vec3::Z, Vec3::ZERO, Vec3::ZERO, 1.0, Vec3::ZERO);

        assert_eq!(find_or_insert(&mut palette, red.clone()), 0);
        assert_eq!(find_or_insert(&mut palette, blue), 1);
        assert_eq!(find_or_insert(&mut palette, red), 0);
        assert_eq!(palette.len(), 2);
    }
}
