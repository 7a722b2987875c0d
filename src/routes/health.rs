use axum::response::Json;
use serde_json::json;

/// Health check endpoint handler.
///
/// # Route
/// - **Method**: GET
/// - **Path**: `/health`
///
/// ```bash
/// curl http://localhost:5000/health
/// # {"status":"healthy","message":"API running","version":"0.1.0"}
/// ```
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "message": "API running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
