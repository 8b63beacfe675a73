//! Deterministic logo stamping.
//!
//! The logo is scaled to a quarter of the background width, keeping its aspect
//! ratio, and alpha-blended at the centre of a copy of the background.

use image::imageops::{self, FilterType};
use image::RgbaImage;
use serde::Serialize;

use crate::error::CompositeError;
use crate::raster::RasterImage;

/// Fraction of the background width the logo is scaled to.
pub const LOGO_WIDTH_RATIO: f64 = 0.25;

/// Upper bound on the scaled logo's area, in pixels.
pub const MAX_LOGO_PIXELS: u64 = 64 * 1024 * 1024;

/// Where and how large the logo lands on the canvas.
///
/// Offsets may be negative when the scaled logo is taller than the canvas; the
/// logo is clipped in that case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LogoPlacement {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl LogoPlacement {
    pub fn fits_within(&self, canvas_width: u32, canvas_height: u32) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.x + i64::from(self.width) <= i64::from(canvas_width)
            && self.y + i64::from(self.height) <= i64::from(canvas_height)
    }
}

/// Pure placement geometry. `logo_width` must be non-zero.
pub fn plan_placement(
    background_width: u32,
    background_height: u32,
    logo_width: u32,
    logo_height: u32,
) -> LogoPlacement {
    let target_width = ((f64::from(background_width) * LOGO_WIDTH_RATIO).floor() as u32).max(1);
    let ratio = f64::from(target_width) / f64::from(logo_width.max(1));
    let target_height = ((f64::from(logo_height) * ratio).floor() as u32).max(1);

    LogoPlacement {
        x: (i64::from(background_width) - i64::from(target_width)).div_euclid(2),
        y: (i64::from(background_height) - i64::from(target_height)).div_euclid(2),
        width: target_width,
        height: target_height,
    }
}

/// Stamps `logo` onto a copy of `background`. Neither input is modified.
pub fn composite(
    background: &RasterImage,
    logo: &RasterImage,
) -> Result<(RasterImage, LogoPlacement), CompositeError> {
    ensure_not_empty("background", background)?;
    ensure_not_empty("logo", logo)?;

    let placement = plan_placement(
        background.width(),
        background.height(),
        logo.width(),
        logo.height(),
    );
    let pixels = u64::from(placement.width) * u64::from(placement.height);
    if pixels > MAX_LOGO_PIXELS {
        return Err(CompositeError::LogoTooLarge {
            width: placement.width,
            height: placement.height,
        });
    }

    let mut canvas = background.to_rgba();
    let logo_rgba = logo.to_rgba();
    let resized = if logo_rgba.dimensions() == (placement.width, placement.height) {
        logo_rgba
    } else {
        imageops::resize(
            &logo_rgba,
            placement.width,
            placement.height,
            FilterType::Lanczos3,
        )
    };
    stamp(&mut canvas, &resized, placement.x, placement.y);

    Ok((RasterImage::from(canvas), placement))
}

/// Masked paste: colour moves toward the logo by the logo's alpha, and alpha
/// composites source-over, so an opaque canvas stays opaque. Pixels that fall
/// outside the canvas are clipped.
fn stamp(canvas: &mut RgbaImage, logo: &RgbaImage, x: i64, y: i64) {
    let (canvas_width, canvas_height) = (i64::from(canvas.width()), i64::from(canvas.height()));
    for (lx, ly, source) in logo.enumerate_pixels() {
        let cx = x + i64::from(lx);
        let cy = y + i64::from(ly);
        if cx < 0 || cy < 0 || cx >= canvas_width || cy >= canvas_height {
            continue;
        }
        let alpha = u32::from(source[3]);
        if alpha == 0 {
            continue;
        }
        let target = canvas.get_pixel_mut(cx as u32, cy as u32);
        for channel in 0..3 {
            target[channel] = lerp(target[channel], source[channel], alpha);
        }
        let below = u32::from(target[3]);
        target[3] = ((alpha * 255 + below * (255 - alpha) + 127) / 255) as u8;
    }
}

fn lerp(below: u8, above: u8, alpha: u32) -> u8 {
    ((u32::from(below) * (255 - alpha) + u32::from(above) * alpha + 127) / 255) as u8
}

/// Decodes both sides from encoded bytes, then composites.
pub fn composite_encoded(
    background: &[u8],
    logo: &[u8],
) -> Result<(RasterImage, LogoPlacement), CompositeError> {
    let background = RasterImage::decode(background)?;
    let logo = RasterImage::decode(logo)?;
    composite(&background, &logo)
}

fn ensure_not_empty(role: &'static str, image: &RasterImage) -> Result<(), CompositeError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(CompositeError::EmptyImage {
            role,
            width,
            height,
        });
    }
    Ok(())
}
