//! HTTP route handlers for the image API.

use crate::image_proc::{
    CacheStats, EffectQuery, ImageProcessor, ImageRequest, ProcessedImage, ProcessingError,
    ValidationError, validate_dimensions,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;

const CACHE_IMMUTABLE: &str = "public, max-age=31536000, immutable";
const CACHE_NO_STORE: &str =
    "no-cache, no-store, must-revalidate, max-age=0, s-maxage=0, proxy-revalidate";

static SURROGATE_CONTROL: HeaderName = HeaderName::from_static("surrogate-control");
static X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<ImageProcessor>,
    pub max_dimension: u32,
    pub default_size: u32,
}

/// Errors surfaced to HTTP clients
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Image processing failed: {0}")]
    ImageProcessingFailure(#[from] ProcessingError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
            ApiError::ImageProcessingFailure(e) => {
                tracing::error!("Image processing error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Error generating image").into_response()
            }
        }
    }
}

/// GET /api/{width}/{height} - Sized image
pub async fn sized_image(
    State(state): State<AppState>,
    Path((width, height)): Path<(String, String)>,
    Query(query): Query<EffectQuery>,
) -> Result<Response, ApiError> {
    let (width, height) = validate_dimensions(&width, &height, state.max_dimension)?;
    let request =
        ImageRequest::from_query(width, height, &query, state.processor.catalog().len());

    let image = state.processor.process(request).await?;
    Ok(image_response(image, None))
}

/// GET /api - Default-size image, always rendered fresh
pub async fn default_image(
    State(state): State<AppState>,
    Query(query): Query<EffectQuery>,
) -> Result<Response, ApiError> {
    let marker = chrono::Utc::now().timestamp_millis();
    let request = ImageRequest::from_query(
        state.default_size,
        state.default_size,
        &query,
        state.processor.catalog().len(),
    )
    .with_force_unique(marker);

    let image = state.processor.process(request).await?;
    Ok(image_response(image, Some(marker)))
}

/// GET /api/cache-stats - Cache statistics
pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.processor.cache_stats())
}

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Attach content type and freshness headers to a rendered image
fn image_response(image: ProcessedImage, unique_marker: Option<i64>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/jpeg"));

    let x_cache = if image.cache_hit {
        "HIT"
    } else if image.cacheable {
        "MISS"
    } else {
        "BYPASS"
    };
    headers.insert(X_CACHE.clone(), HeaderValue::from_static(x_cache));

    if image.cacheable {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_IMMUTABLE));
        let digest = hex::encode(Sha256::digest(&image.data));
        if let Ok(etag) = HeaderValue::from_str(&format!("\"{}\"", digest)) {
            headers.insert(header::ETAG, etag);
        }
    } else {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_NO_STORE));
        headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
        headers.insert(SURROGATE_CONTROL.clone(), HeaderValue::from_static("no-store"));
    }

    if let Some(marker) = unique_marker {
        if let Ok(etag) = HeaderValue::from_str(&format!("\"random-{}\"", marker)) {
            headers.insert(header::ETAG, etag);
        }
        if let Some(modified) = chrono::DateTime::from_timestamp_millis(marker) {
            let modified = modified.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
            if let Ok(value) = HeaderValue::from_str(&modified) {
                headers.insert(header::LAST_MODIFIED, value);
            }
        }
    }

    (StatusCode::OK, headers, image.data).into_response()
}
