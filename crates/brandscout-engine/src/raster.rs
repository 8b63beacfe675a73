//! In-memory images flowing through a run.
//!
//! Uploads stay as raw bytes plus a MIME type (the analysis service wants them
//! that way); they are decoded into [`RasterImage`] only where pixels are needed.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::error::CompositeError;

/// A decoded bitmap. Transforms always return a new value.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    image: DynamicImage,
}

impl RasterImage {
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CompositeError> {
        let image = image::load_from_memory(bytes)?;
        Ok(Self { image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    pub fn has_alpha(&self) -> bool {
        self.image.color().has_alpha()
    }

    /// RGBA copy; sources without alpha come out fully opaque.
    pub fn to_rgba(&self) -> RgbaImage {
        self.image.to_rgba8()
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, image::ImageError> {
        let mut out = Cursor::new(Vec::new());
        self.image.write_to(&mut out, ImageFormat::Png)?;
        Ok(out.into_inner())
    }

    pub fn save(&self, path: &Path) -> Result<(), image::ImageError> {
        self.image.save(path)
    }
}

impl From<RgbaImage> for RasterImage {
    fn from(image: RgbaImage) -> Self {
        Self::new(DynamicImage::ImageRgba8(image))
    }
}

/// Raw image bytes as supplied by the user, with their declared MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub name: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageUpload {
    /// Builds an upload, sniffing the MIME type from the bytes when `mime_type` is `None`.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>, mime_type: Option<&str>) -> Self {
        let mime_type = mime_type
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| sniff_mime(&bytes).to_string());
        Self {
            name: name.into(),
            bytes,
            mime_type,
        }
    }

    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .and_then(|value| value.to_str())
            .unwrap_or("image")
            .to_string();
        Ok(Self::new(name, bytes, mime_for_path(path)))
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn decode(&self) -> Result<RasterImage, CompositeError> {
        RasterImage::decode(&self.bytes)
    }
}

/// Ordered, non-empty set of style references. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSet {
    images: Vec<ImageUpload>,
}

impl ReferenceSet {
    /// `None` when `images` is empty.
    pub fn new(images: Vec<ImageUpload>) -> Option<Self> {
        if images.is_empty() {
            return None;
        }
        Some(Self { images })
    }

    pub fn images(&self) -> &[ImageUpload] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Encoded output of the synthesis service, decoded at composite time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

impl GeneratedImage {
    pub fn decode(&self) -> Result<RasterImage, CompositeError> {
        RasterImage::decode(&self.bytes)
    }
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

fn sniff_mime(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Jpeg) => "image/jpeg",
        Ok(ImageFormat::WebP) => "image/webp",
        Ok(ImageFormat::Gif) => "image/gif",
        _ => "image/png",
    }
}
