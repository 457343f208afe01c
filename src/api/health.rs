use axum::{response::IntoResponse, Json};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Service is healthy"))
)]
pub async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
