use image::RgbaImage;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub(crate) usize);

impl TextureId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Where a texture's encoded bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// URL, file path or `data:` URI.
    Uri(String),
    /// Bytes embedded in the asset (glTF buffer view or GLB chunk).
    Embedded {
        name: String,
        mime_type: String,
        bytes: Arc<[u8]>,
    },
}

impl ImageSource {
    pub fn uri(&self) -> &str {
        match self {
            ImageSource::Uri(uri) => uri,
            ImageSource::Embedded { name, .. } => name,
        }
    }
}

/// Decoded pixels plus the image they were derived from, if any
/// (a normal map generated from a height map keeps the height map here).
#[derive(Debug, Clone)]
pub struct TextureImage {
    pub src: String,
    pub pixels: Arc<RgbaImage>,
    pub source_hash: Option<String>,
    pub derived_from: Option<Box<TextureImage>>,
}

impl TextureImage {
    pub fn new(src: impl Into<String>, pixels: Arc<RgbaImage>) -> Self {
        Self {
            src: src.into(),
            pixels,
            source_hash: None,
            derived_from: None,
        }
    }

    pub fn derive(self, pixels: RgbaImage) -> Self {
        Self {
            src: String::new(),
            pixels: Arc::new(pixels),
            source_hash: None,
            derived_from: Some(Box::new(self)),
        }
    }

    /// Source URI of the first image in the derivation chain.
    pub fn original_src(&self) -> &str {
        let mut image = self;
        while let Some(parent) = image.derived_from.as_deref() {
            image = parent;
        }
        &image.src
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }
}

#[derive(Debug, Clone)]
pub struct CubeMap {
    pub size: u32,
    /// +X, -X, +Y, -Y, +Z, -Z
    pub faces: [RgbaImage; 6],
    pub src: String,
}

#[derive(Debug, Clone)]
pub enum TextureData {
    Image(TextureImage),
    Cube(CubeMap),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureState {
    Pending,
    Resident,
    Failed,
}

#[derive(Debug, Clone)]
pub struct Texture {
    pub source: ImageSource,
    pub flip_y: bool,
    pub anisotropic: u32,
    data: Option<TextureData>,
    state: TextureState,
    version: u64,
}

impl Texture {
    pub fn pending(source: ImageSource) -> Self {
        Self {
            source,
            flip_y: false,
            anisotropic: 8,
            data: None,
            state: TextureState::Pending,
            version: 0,
        }
    }

    pub fn resident(source: ImageSource, data: TextureData) -> Self {
        let mut texture = Self::pending(source);
        texture.set_data(data);
        texture
    }

    pub fn state(&self) -> TextureState {
        self.state
    }

    pub fn is_renderable(&self) -> bool {
        self.state == TextureState::Resident
    }

    pub fn data(&self) -> Option<&TextureData> {
        self.data.as_ref()
    }

    pub fn image(&self) -> Option<&TextureImage> {
        match &self.data {
            Some(TextureData::Image(image)) => Some(image),
            _ => None,
        }
    }

    pub fn set_data(&mut self, data: TextureData) {
        self.data = Some(data);
        self.state = TextureState::Resident;
        self.dirty();
    }

    pub fn take_image(&mut self) -> Option<TextureImage> {
        match self.data.take() {
            Some(TextureData::Image(image)) => Some(image),
            other => {
                self.data = other;
                None
            }
        }
    }

    pub fn mark_failed(&mut self) {
        self.state = TextureState::Failed;
    }

    /// Bump the upload version so the renderer re-uploads the texture.
    pub fn dirty(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// URI reported to callers: the original source of the displayed image.
    pub fn source_uri(&self) -> &str {
        match &self.data {
            Some(TextureData::Image(image)) => image.original_src(),
            Some(TextureData::Cube(cube)) => &cube.src,
            None => self.source.uri(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn original_src_walks_the_derivation_chain() {
        let height = TextureImage::new("bump.png", Arc::new(RgbaImage::new(2, 2)));
        let normal = height.derive(RgbaImage::new(2, 2));
        assert_eq!(normal.src, "");
        assert_eq!(normal.original_src(), "bump.png");
    }

    #[test]
    fn set_data_makes_texture_renderable_and_dirty() {
        let mut texture = Texture::pending(ImageSource::Uri("a.png".into()));
        assert!(!texture.is_renderable());
        let before = texture.version();
        texture.set_data(TextureData::Image(TextureImage::new(
            "a.png",
            Arc::new(RgbaImage::new(1, 1)),
        )));
        assert!(texture.is_renderable());
        assert!(texture.version() > before);
    }
}
