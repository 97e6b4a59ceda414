use crate::transport::http::types::{ApiResponse, AppState};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy (backend reachable)", body = ApiResponse),
        (status = 503, description = "Service is unhealthy (backend unreachable or not configured)", body = ApiResponse)
    )
)]
pub async fn healthcheck_handler(State(state): State<AppState>) -> impl IntoResponse {
    let backend = state.backend.mode.as_str();
    match state.backend.ping().await {
        Ok(_) => (
            StatusCode::OK,
            Json(ApiResponse::ok(
                Some(serde_json::json!({ "status": "ok", "backend": backend })),
                None,
            )),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::fail(
                format!("Backend ping failed: {}", e),
                Some(serde_json::json!({ "status": "unhealthy", "backend": backend })),
                None,
            )),
        ),
    }
}
