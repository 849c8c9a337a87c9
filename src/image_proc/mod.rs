//! Image processing module.
//!
//! Provides source selection, transformation and caching for rendered
//! placeholder images.

pub mod cache;
pub mod catalog;
pub mod effects;
pub mod params;
pub mod transform;

pub use cache::{CacheStats, ImageCache};
pub use catalog::Catalog;
pub use params::{EffectQuery, ImageRequest, ValidationError, validate_dimensions};

use bytes::Bytes;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;

/// Image processing errors
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("Failed to read source image {}: {source}", .path.display())]
    SourceRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Image decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Image encode failed: {0}")]
    Encode(image::ImageError),

    #[error("Render worker failed: {0}")]
    Worker(String),
}

/// A rendered image and how it was produced
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub data: Bytes,
    pub cacheable: bool,
    pub cache_hit: bool,
}

/// Image processor that handles the full pipeline
pub struct ImageProcessor {
    catalog: Catalog,
    cache: ImageCache,
    permits: Arc<Semaphore>,
    jpeg_quality: u8,
}

impl ImageProcessor {
    /// Create a new image processor
    pub fn new(catalog: Catalog, cache: ImageCache, max_concurrent: usize, jpeg_quality: u8) -> Self {
        Self {
            catalog,
            cache,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            jpeg_quality,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Cache statistics after dropping stale entries
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.sweep();
        self.cache.stats()
    }

    /// Produce the JPEG for a request
    ///
    /// Full pipeline:
    /// 1. Serve from cache when the request is cacheable and fresh
    /// 2. Pick the source image (explicit index or random)
    /// 3. Decode, transform and encode on the blocking pool
    /// 4. Store the result if cacheable
    pub async fn process(&self, request: ImageRequest) -> Result<ProcessedImage, ProcessingError> {
        let cacheable = request.is_cacheable();

        if let Some(data) = self.cache.lookup(&request) {
            return Ok(ProcessedImage {
                data,
                cacheable,
                cache_hit: true,
            });
        }

        if !cacheable {
            tracing::debug!("Random image or unique request - bypassing cache");
        }

        let (index, path) = self.catalog.select(request.image);
        let path = path.to_path_buf();
        tracing::info!(
            "Rendering {}x{} from catalog image {} ({})",
            request.width,
            request.height,
            index,
            path.display()
        );

        // The permit moves into the job so it is held until the render
        // finishes, even if the caller goes away first
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| ProcessingError::Worker(e.to_string()))?;

        let quality = self.jpeg_quality;
        let job = request.clone();
        let data = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let source = transform::load_source(&path)?;
            transform::render(source, &job, quality)
        })
        .await
        .map_err(|e| ProcessingError::Worker(e.to_string()))??;

        let data = Bytes::from(data);
        self.cache.store(&request, data.clone());

        Ok(ProcessedImage {
            data,
            cacheable,
            cache_hit: false,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::time::Duration;
    use tempfile::TempDir;

    /// A catalog of visually distinct PNGs in a temp directory
    pub fn fixture_catalog(count: usize) -> (TempDir, Catalog) {
        let dir = tempfile::tempdir().unwrap();
        let paths = (0..count)
            .map(|i| {
                let path = dir.path().join(format!("bug-{i}.png"));
                let shade = (i * 255 / count.max(1)) as u8;
                RgbImage::from_fn(64, 48, |x, y| {
                    Rgb([shade, (x * 4) as u8, (y * 5) as u8 ^ shade])
                })
                .save(&path)
                .unwrap();
                path
            })
            .collect();
        (dir, Catalog::new(paths).unwrap())
    }

    pub fn fixture_processor(count: usize) -> (TempDir, ImageProcessor) {
        let (dir, catalog) = fixture_catalog(count);
        let cache = ImageCache::new(Duration::from_secs(3600), 100);
        (dir, ImageProcessor::new(catalog, cache, 2, 80))
    }
}
