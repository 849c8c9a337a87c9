//! Effect scale mapping and per-pixel colour operations.
//!
//! The 1-9 user scale maps linearly onto each effect's native range. The
//! saturation midpoint (5) lands on 2.3x rather than 1.0x; that asymmetry is
//! kept so existing image URLs keep rendering the same.

use super::params::{EffectScale, Tint};
use image::RgbImage;

fn scale_fraction(scale: EffectScale) -> f32 {
    f32::from(scale.get() - EffectScale::MIN) / f32::from(EffectScale::MAX - EffectScale::MIN)
}

/// Saturation multiplier in [0.1, 4.5]
pub fn map_saturation(scale: EffectScale) -> f32 {
    0.1 + scale_fraction(scale) * 4.4
}

/// Gaussian sigma in [0.3, 3.5]
pub fn map_blur(scale: EffectScale) -> f32 {
    0.3 + scale_fraction(scale) * 3.2
}

/// Contrast slope in [0.1, 3.0]
pub fn map_contrast(scale: EffectScale) -> f32 {
    0.1 + scale_fraction(scale) * 2.9
}

/// Offset paired with a contrast slope so mid-gray stays fixed
pub fn contrast_offset(slope: f32) -> f32 {
    -(slope * 0.5) + 0.5
}

/// Rec. 601 luma of an RGB triple, 0-255
#[inline]
fn luma(r: f32, g: f32, b: f32) -> f32 {
    0.299 * r + 0.587 * g + 0.114 * b
}

#[inline]
fn to_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Scale each pixel's distance from its own luma by `factor`
pub fn adjust_saturation(img: &mut RgbImage, factor: f32) {
    for pixel in img.pixels_mut() {
        let [r, g, b] = pixel.0.map(f32::from);
        let y = luma(r, g, b);
        pixel.0 = [r, g, b].map(|c| to_channel(y + (c - y) * factor));
    }
}

/// Linear transform `a*v + b` on normalised channels
pub fn adjust_contrast(img: &mut RgbImage, slope: f32) {
    let offset = contrast_offset(slope);

    // Only 256 possible inputs
    let lut: [u8; 256] = std::array::from_fn(|v| {
        let normalised = v as f32 / 255.0;
        to_channel((slope * normalised + offset) * 255.0)
    });

    for pixel in img.pixels_mut() {
        pixel.0 = pixel.0.map(|c| lut[usize::from(c)]);
    }
}

/// Keep each pixel's luma and replace its chroma with the tint's
pub fn apply_tint(img: &mut RgbImage, tint: Tint) {
    let tint_rgb = [tint.r, tint.g, tint.b].map(f32::from);
    let tint_luma = luma(tint_rgb[0], tint_rgb[1], tint_rgb[2]);
    let chroma = tint_rgb.map(|c| c - tint_luma);

    for pixel in img.pixels_mut() {
        let [r, g, b] = pixel.0.map(f32::from);
        let y = luma(r, g, b);
        pixel.0 = [
            to_channel(y + chroma[0]),
            to_channel(y + chroma[1]),
            to_channel(y + chroma[2]),
        ];
    }
}
