//! Web server module for the image API.
//!
//! Provides an HTTP server using Axum that serves rendered placeholder images.

pub mod routes;

use crate::config::Config;
use crate::image_proc::ImageProcessor;
use axum::{Router, routing::get};
use routes::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;

/// Web server errors
#[derive(Error, Debug)]
pub enum WebError {
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),

    #[error("Server error: {0}")]
    ServerError(String),
}

/// Web server configuration
pub struct WebServer {
    state: AppState,
    base_path: String,
}

impl WebServer {
    /// Create a new web server
    pub fn new(config: &Config, processor: Arc<ImageProcessor>) -> Self {
        Self {
            state: AppState {
                processor,
                max_dimension: config.max_dimension,
                default_size: config.default_size,
            },
            base_path: config.base_path.clone(),
        }
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let routes = Router::new()
            .route("/api", get(routes::default_image))
            .route("/api/cache-stats", get(routes::cache_stats))
            .route("/api/{width}/{height}", get(routes::sized_image))
            .route("/health", get(routes::health))
            .with_state(self.state.clone());

        if self.base_path.is_empty() {
            routes
        } else {
            Router::new().nest(&self.base_path, routes)
        }
    }

    /// Run the web server with graceful shutdown
    pub async fn run_with_shutdown(
        &self,
        port: u16,
        shutdown: tokio::sync::broadcast::Receiver<()>,
    ) -> Result<(), WebError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Web server listening on http://{}{}", addr, self.base_path);

        let mut shutdown = shutdown;
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Web server shutting down gracefully");
            })
            .await
            .map_err(|e| WebError::ServerError(e.to_string()))
    }
}
