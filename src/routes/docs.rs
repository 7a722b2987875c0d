use axum::extract::State;
use axum::response::Json;

use crate::routes::DOCUMENTED_ROUTES;
use crate::server::AppState;

/// Swagger document assembled from the loaded operation docs
pub async fn apispec(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(state.docs.openapi(DOCUMENTED_ROUTES))
}
