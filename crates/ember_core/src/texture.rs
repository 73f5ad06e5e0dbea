//! Texture loading and the per-load texture cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ember_math::Vec3;
use thiserror::Error;

/// Errors that can occur while decoding a texture.
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image decoding error: {0}")]
    Image(#[from] image::ImageError),
}

pub type TextureResult<T> = Result<T, TextureError>;

/// A decoded texture in linear RGBA floats.
///
/// A placeholder (failed or never-loaded) texture has zero dimensions;
/// `is_valid` distinguishes the two states.
#[derive(Debug, Clone)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    /// Pixels as `[r, g, b, a]`, row-major.
    pixels: Vec<[f32; 4]>,
    /// Cache key this texture was loaded under.
    pub path: String,
}

impl Texture {
    /// A placeholder standing in for a texture that could not be loaded.
    pub fn placeholder(path: impl Into<String>) -> Self {
        Self {
            width: 0,
            height: 0,
            pixels: Vec::new(),
            path: path.into(),
        }
    }

    /// Decode a texture from a file on disk.
    pub fn from_path(path: &Path) -> TextureResult<Self> {
        let img = image::open(path)?;
        Ok(Self::from_image(img, path.to_string_lossy().into_owned()))
    }

    /// Decode a texture from an in-memory encoded image.
    pub fn from_bytes(bytes: &[u8], path: impl Into<String>) -> TextureResult<Self> {
        let img = image::load_from_memory(bytes)?;
        Ok(Self::from_image(img, path.into()))
    }

    fn from_image(img: image::DynamicImage, path: String) -> Self {
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();

        let pixels = rgba
            .pixels()
            .map(|p| {
                [
                    srgb_to_linear(p[0]),
                    srgb_to_linear(p[1]),
                    srgb_to_linear(p[2]),
                    p[3] as f32 / 255.0,
                ]
            })
            .collect();

        Self {
            width,
            height,
            pixels,
            path,
        }
    }

    /// Whether pixel data was actually decoded.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && !self.pixels.is_empty()
    }

    /// Sample the texture at UV coordinates in `[0, 1]` with bilinear
    /// filtering. Placeholders sample black.
    pub fn sample(&self, u: f32, v: f32) -> Vec3 {
        if !self.is_valid() {
            return Vec3::ZERO;
        }

        let u = u.rem_euclid(1.0);
        let v = v.rem_euclid(1.0);

        let x = u * (self.width as f32 - 1.0);
        let y = (1.0 - v) * (self.height as f32 - 1.0);

        let x0 = x.floor() as u32;
        let y0 = y.floor() as u32;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);

        let fx = x.fract();
        let fy = y.fract();

        let p00 = self.pixel(x0, y0);
        let p10 = self.pixel(x1, y0);
        let p01 = self.pixel(x0, y1);
        let p11 = self.pixel(x1, y1);

        let top = p00 * (1.0 - fx) + p10 * fx;
        let bottom = p01 * (1.0 - fx) + p11 * fx;
        top * (1.0 - fy) + bottom * fy
    }

    fn pixel(&self, x: u32, y: u32) -> Vec3 {
        let [r, g, b, _] = self.pixels[(y * self.width + x) as usize];
        Vec3::new(r, g, b)
    }
}

/// Convert an sRGB byte value to a linear float.
fn srgb_to_linear(value: u8) -> f32 {
    let v = value as f32 / 255.0;
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

/// Cache of textures keyed by the file name they were requested under.
///
/// Owned by whoever drives a scene load; a failed load is cached as a
/// placeholder so each missing file is reported once.
pub struct TextureCache {
    textures: HashMap<String, Arc<Texture>>,
    base_dir: Option<PathBuf>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self {
            textures: HashMap::new(),
            base_dir: None,
        }
    }

    /// A cache resolving relative texture names against `base_dir`.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            textures: HashMap::new(),
            base_dir: Some(base_dir.into()),
        }
    }

    /// Get or load the texture for `name`.
    ///
    /// Decode failures are logged and cached as invalid placeholders;
    /// callers decide what a placeholder means for them.
    pub fn fetch(&mut self, name: &str) -> Arc<Texture> {
        if let Some(texture) = self.textures.get(name) {
            return texture.clone();
        }

        let full_path = self.resolve_path(name);
        let texture = match Texture::from_path(&full_path) {
            Ok(texture) => {
                log::debug!(
                    "loaded texture {} ({}x{})",
                    full_path.display(),
                    texture.width,
                    texture.height
                );
                texture
            }
            Err(err) => {
                log::warn!("failed to load texture {}: {err}", full_path.display());
                Texture::placeholder(name)
            }
        };

        let texture = Arc::new(texture);
        self.textures.insert(name.to_string(), texture.clone());
        texture
    }

    /// Get a cached texture without loading.
    pub fn get(&self, name: &str) -> Option<Arc<Texture>> {
        self.textures.get(name).cloned()
    }

    pub fn is_cached(&self, name: &str) -> bool {
        self.textures.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    fn resolve_path(&self, name: &str) -> PathBuf {
        let path = Path::new(name);

        if path.is_absolute() {
            path.to_path_buf()
        } else if let Some(base) = &self.base_dir {
            base.join(path)
        } else {
            path.to_path_buf()
        }
    }
}

impl Default for TextureCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Encode a tiny image so decoding can be exercised without fixtures.
    fn encoded_probe_image() -> Vec<u8> {
        let mut img = image::RgbaImage::new(2, 1);
        img.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        img.put_pixel(1, 0, image::Rgba([0, 0, 255, 255]));

        let mut bytes = std::io::Cursor::new(Vec::new());
        img.write_to(&mut bytes, image::ImageFormat::Png)
            .expect("in-memory PNG encode");
        bytes.into_inner()
    }

    #[test]
    fn test_texture_from_bytes() {
        let texture = Texture::from_bytes(&encoded_probe_image(), "probe.png").unwrap();

        assert!(texture.is_valid());
        assert_eq!(texture.width, 2);
        assert_eq!(texture.height, 1);

        let left = texture.sample(0.0, 0.5);
        assert!(left.x > 0.9 && left.z < 0.1);
    }

    #[test]
    fn test_texture_from_garbage_bytes_fails() {
        assert!(Texture::from_bytes(b"not an image", "bad.png").is_err());
    }

    #[test]
    fn test_placeholder_is_invalid() {
        let placeholder = Texture::placeholder("missing.png");
        assert!(!placeholder.is_valid());
        assert_eq!(placeholder.sample(0.5, 0.5), Vec3::ZERO);
    }

    #[test]
    fn test_cache_stores_placeholder_for_missing_file() {
        let mut cache = TextureCache::new();
        let texture = cache.fetch("definitely/not/a/real/texture.png");

        assert!(!texture.is_valid());
        assert!(cache.is_cached("definitely/not/a/real/texture.png"));
        assert_eq!(cache.len(), 1);

        // Second fetch returns the same allocation.
        let again = cache.fetch("definitely/not/a/real/texture.png");
        assert!(Arc::ptr_eq(&texture, &again));
    }

    #[test]
    fn test_srgb_to_linear_endpoints() {
        assert!(srgb_to_linear(0).abs() < 1e-6);
        assert!((srgb_to_linear(255) - 1.0).abs() < 1e-6);
        let mid = srgb_to_linear(128);
        assert!(mid > 0.1 && mid < 0.5);
    }
}
