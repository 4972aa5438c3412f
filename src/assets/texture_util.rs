use crate::assets::{AssetError, ResourceResolver};
use crate::scene::texture::{CubeMap, ImageSource, TextureImage};
use glam::Vec3;
use image::{Rgba, RgbaImage};
use sha2::{Digest, Sha256};
use std::f32::consts::PI;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error(transparent)]
    Resolve(#[from] AssetError),
    #[error("failed to decode texture {uri}: {source}")]
    Decode {
        uri: String,
        #[source]
        source: image::ImageError,
    },
}

/// Encoded bytes of an image source.
pub fn read_source(source: &ImageSource, resolver: &ResourceResolver) -> Result<Arc<[u8]>, TextureError> {
    match source {
        ImageSource::Embedded { bytes, .. } => Ok(bytes.clone()),
        ImageSource::Uri(uri) => Ok(resolver.read(uri)?),
    }
}

pub fn source_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub fn decode_bytes(uri: &str, bytes: &[u8]) -> Result<RgbaImage, TextureError> {
    image::load_from_memory(bytes)
        .map(|image| image.to_rgba8())
        .map_err(|source| TextureError::Decode {
            uri: uri.to_string(),
            source,
        })
}

/// True when every pixel is gray, i.e. the image encodes height rather
/// than a tangent-space normal.
pub fn is_height_image(image: &RgbaImage) -> bool {
    image.width() > 0
        && image.height() > 0
        && image.pixels().all(|Rgba([r, g, b, _])| r == g && g == b)
}

/// Tangent-space normal map from a grayscale height map, by central
/// differences with wrap-around edges.
pub fn height_to_normal(height: &RgbaImage) -> RgbaImage {
    const STRENGTH: f32 = 2.0;
    let (width, rows) = height.dimensions();
    let sample = |x: i64, y: i64| -> f32 {
        let x = x.rem_euclid(width as i64) as u32;
        let y = y.rem_euclid(rows as i64) as u32;
        height.get_pixel(x, y)[0] as f32 / 255.0
    };
    RgbaImage::from_fn(width, rows, |x, y| {
        let (x, y) = (x as i64, y as i64);
        let dx = sample(x + 1, y) - sample(x - 1, y);
        let dy = sample(x, y + 1) - sample(x, y - 1);
        let normal = Vec3::new(-dx * STRENGTH, -dy * STRENGTH, 1.0).normalize();
        let encoded = (normal * 0.5 + Vec3::splat(0.5)) * 255.0;
        Rgba([
            encoded.x.round() as u8,
            encoded.y.round() as u8,
            encoded.z.round() as u8,
            255,
        ])
    })
}

/// Resample an equirectangular panorama into six cube faces, each one
/// quarter of the panorama's width.
pub fn panorama_to_cube_map(panorama: &TextureImage) -> CubeMap {
    let size = ((panorama.width() as f32 / 4.0).round() as u32).max(1);
    let pixels = &panorama.pixels;
    let faces = [0usize, 1, 2, 3, 4, 5].map(|face| {
        RgbaImage::from_fn(size, size, |x, y| {
            let u = 2.0 * (x as f32 + 0.5) / size as f32 - 1.0;
            let v = 2.0 * (y as f32 + 0.5) / size as f32 - 1.0;
            let direction = match face {
                0 => Vec3::new(1.0, -v, -u),
                1 => Vec3::new(-1.0, -v, u),
                2 => Vec3::new(u, 1.0, v),
                3 => Vec3::new(u, -1.0, -v),
                4 => Vec3::new(u, -v, 1.0),
                _ => Vec3::new(-u, -v, -1.0),
            }
            .normalize();
            sample_equirect(pixels, direction)
        })
    });
    CubeMap {
        size,
        faces,
        src: panorama.original_src().to_string(),
    }
}

fn sample_equirect(image: &RgbaImage, direction: Vec3) -> Rgba<u8> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Rgba([0, 0, 0, 255]);
    }
    let theta = direction.x.atan2(-direction.z);
    let phi = direction.y.clamp(-1.0, 1.0).asin();
    let u = 0.5 + theta / (2.0 * PI);
    let v = 0.5 - phi / PI;
    let x = ((u * width as f32) as u32).min(width - 1);
    let y = ((v * height as f32) as u32).min(height - 1);
    *image.get_pixel(x, y)
}
