use std::path::Path;

use axum::{http::StatusCode, routing::get, Router};
use tower_http::services::ServeDir;

/// Serves stored media by file name. The root itself is never listed.
pub fn router(root: impl AsRef<Path>) -> Router {
    let files = ServeDir::new(root.as_ref()).append_index_html_on_directories(false);
    Router::new()
        .route("/", get(|| async { StatusCode::NOT_FOUND }))
        .fallback_service(files)
}
