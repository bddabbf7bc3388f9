//! HTTP surface of the panel.

pub mod containers;
pub mod error;
pub mod logs;

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::services::ServeDir;

use crate::runtime::ContainerRuntime;

/// State shared across axum handlers.
pub struct AppState {
    pub runtime: Arc<dyn ContainerRuntime>,
    /// Image used when a create request does not name one.
    pub default_image: String,
}

pub fn router(state: Arc<AppState>, static_dir: Option<&Path>) -> Router {
    let router = Router::new()
        .route("/containers", get(containers::list_containers))
        .route("/containers/create", post(containers::create_container))
        .route("/containers/{id}/start", post(containers::start_container))
        .route("/containers/{id}/stop", post(containers::stop_container))
        .route("/containers/{id}/logs", get(logs::stream_logs))
        .with_state(state);

    match static_dir {
        Some(dir) if dir.is_dir() => {
            log::info!("Serving static files from {}", dir.display());
            router.fallback_service(ServeDir::new(dir))
        }
        Some(dir) => {
            log::warn!(
                "Static directory {} does not exist, not serving assets",
                dir.display()
            );
            router
        }
        None => router,
    }
}
