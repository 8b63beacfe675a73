use image::{Rgb, RgbImage};
use sha2::{Digest, Sha256};

use super::{MockupSynthesizer, StyleAnalyzer};
use crate::config::parse_ratio;
use crate::error::ProviderError;
use crate::prompts::STYLE_LEAD_IN;
use crate::raster::{GeneratedImage, ImageUpload, RasterImage};

const PALETTES: [&str; 4] = [
    "warm amber and cream",
    "cool slate and steel blue",
    "forest green and raw linen",
    "charcoal with neon magenta accents",
];
const SURFACES: [&str; 4] = ["matte concrete", "glossy acrylic", "oiled walnut", "brushed aluminium"];

/// Offline analyzer: the description is a pure function of the reference bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryrunAnalyzer;

impl StyleAnalyzer for DryrunAnalyzer {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn analyze(&self, _instruction: &str, images: &[ImageUpload]) -> Result<String, ProviderError> {
        let mut hasher = Sha256::new();
        for image in images {
            hasher.update(&image.bytes);
        }
        let digest = hasher.finalize();
        let palette = PALETTES[usize::from(digest[0]) % PALETTES.len()];
        let surface = SURFACES[usize::from(digest[1]) % SURFACES.len()];
        Ok(format!(
            "{STYLE_LEAD_IN} on {surface} under soft diffused studio light, minimalist centered composition, {palette} palette (ref {}).",
            hex::encode(&digest[..4])
        ))
    }
}

/// Offline synthesizer: a flat PNG coloured by the prompt, sized to the aspect ratio.
#[derive(Debug, Clone, Copy)]
pub struct DryrunSynthesizer {
    pub long_edge: u32,
}

impl Default for DryrunSynthesizer {
    fn default() -> Self {
        Self { long_edge: 1024 }
    }
}

impl DryrunSynthesizer {
    fn dimensions(&self, aspect_ratio: &str) -> (u32, u32) {
        let (w, h) = parse_ratio(aspect_ratio).unwrap_or((16.0, 9.0));
        let long_edge = f64::from(self.long_edge.max(1));
        if w >= h {
            (self.long_edge.max(1), ((long_edge * h / w).round() as u32).max(1))
        } else {
            (((long_edge * w / h).round() as u32).max(1), self.long_edge.max(1))
        }
    }
}

impl MockupSynthesizer for DryrunSynthesizer {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn synthesize(&self, prompt: &str, aspect_ratio: &str) -> Result<GeneratedImage, ProviderError> {
        let (width, height) = self.dimensions(aspect_ratio);
        let (r, g, b) = color_from_prompt(prompt);
        let canvas = RgbImage::from_pixel(width, height, Rgb([r, g, b]));
        let bytes = RasterImage::new(canvas.into())
            .encode_png()
            .map_err(|err| ProviderError::invalid_response("dryrun", err.to_string()))?;
        Ok(GeneratedImage {
            bytes,
            mime_type: Some("image/png".to_string()),
        })
    }
}

fn color_from_prompt(prompt: &str) -> (u8, u8, u8) {
    let digest = Sha256::digest(prompt.as_bytes());
    (digest[0], digest[1], digest[2])
}
