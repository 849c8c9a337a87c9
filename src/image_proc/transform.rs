//! Image transformation pipeline.
//!
//! Cover resize, then saturation, blur, contrast and tint in that order, then
//! JPEG encoding.

use super::ProcessingError;
use super::effects::{
    adjust_contrast, adjust_saturation, apply_tint, map_blur, map_contrast, map_saturation,
};
use super::params::ImageRequest;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, RgbImage};
use std::io::Cursor;
use std::path::Path;

/// Read and decode a catalog source image
pub fn load_source(path: &Path) -> Result<DynamicImage, ProcessingError> {
    let bytes = std::fs::read(path).map_err(|source| ProcessingError::SourceRead {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!("Read {} bytes from {}, decoding...", bytes.len(), path.display());

    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ProcessingError::Decode(image::ImageError::IoError(e)))?;

    Ok(reader.decode()?)
}

/// Render a request against a decoded source and encode it as JPEG
pub fn render(
    source: DynamicImage,
    request: &ImageRequest,
    quality: u8,
) -> Result<Vec<u8>, ProcessingError> {
    let mut img = scale_to_fill(source, request.width, request.height).into_rgb8();

    if let Some(scale) = request.saturation {
        let factor = map_saturation(scale);
        tracing::debug!("Applying saturation {:.3}", factor);
        adjust_saturation(&mut img, factor);
    }

    if let Some(scale) = request.blur {
        let sigma = map_blur(scale);
        tracing::debug!("Applying blur sigma {:.3}", sigma);
        img = image::imageops::blur(&img, sigma);
    }

    if let Some(scale) = request.contrast {
        let slope = map_contrast(scale);
        tracing::debug!("Applying contrast slope {:.3}", slope);
        adjust_contrast(&mut img, slope);
    }

    if let Some(tint) = request.tint {
        tracing::debug!("Applying tint #{}", tint.to_hex());
        apply_tint(&mut img, tint);
    }

    encode_jpeg(&img, quality)
}

/// Scale image to fill dimensions (crop overflow)
fn scale_to_fill(img: DynamicImage, target_width: u32, target_height: u32) -> DynamicImage {
    let (src_width, src_height) = img.dimensions();

    // Calculate scale factor to fill bounds
    let scale_w = target_width as f64 / src_width as f64;
    let scale_h = target_height as f64 / src_height as f64;
    let scale = scale_w.max(scale_h);

    // Rounding up keeps both sides at least as large as the target
    let new_width = ((src_width as f64 * scale).ceil() as u32).max(target_width);
    let new_height = ((src_height as f64 * scale).ceil() as u32).max(target_height);

    tracing::debug!(
        "Scaling {}x{} -> {}x{} (fill {}x{})",
        src_width,
        src_height,
        new_width,
        new_height,
        target_width,
        target_height
    );

    let resized = img.resize_exact(new_width, new_height, image::imageops::FilterType::Lanczos3);

    // Crop to target size (center crop)
    let crop_x = (new_width - target_width) / 2;
    let crop_y = (new_height - target_height) / 2;

    resized.crop_imm(crop_x, crop_y, target_width, target_height)
}

fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>, ProcessingError> {
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    img.write_with_encoder(encoder)
        .map_err(ProcessingError::Encode)?;

    tracing::debug!("Encoded {}x{} JPEG, {} bytes", img.width(), img.height(), buffer.len());
    Ok(buffer)
}
