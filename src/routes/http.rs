// GET handlers: banner, version

use axum::response::IntoResponse;

/// Package name and version, fixed at build time.
const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

pub(super) async fn root_handler() -> &'static str {
    "WireGuard peer health monitor"
}

/// GET /version: service name and version.
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}
