//! Two-step row actions: open a confirmation, then confirm or cancel it by
//! token. Nothing is mutated until confirm.

use crate::app::{authorize, Access, ServiceError};
use crate::domain::confirm::RowAction;
use crate::domain::notice::Notice;
use crate::transport::http::handlers::common::resolve_for;
use crate::transport::http::types::{
    error_response, json_422, ok_response, ApiResponse, AppState, PendingActionResponse, Session,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::{Extension, Json};
use serde_json::json;
use tracing::{info, warn};

#[utoipa::path(
    post,
    path = "/api/resources/{resource}/actions",
    params(("resource" = String, Path, description = "Resource key")),
    request_body = RowAction,
    responses(
        (status = 200, description = "Confirmation opened; `data` carries the token and prompt", body = ApiResponse),
        (status = 400, description = "Malformed action (e.g. empty selection)", body = ApiResponse),
        (status = 403, description = "Role does not allow the action", body = ApiResponse),
        (status = 422, description = "Invalid JSON body", body = ApiResponse)
    ),
    security(("bearer" = []))
)]
pub async fn open_action_handler(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(resource): Path<String>,
    request: Result<Json<RowAction>, JsonRejection>,
) -> Response {
    let Json(action) = match request {
        Ok(v) => v,
        Err(e) => return json_422(e, "{\"type\": \"delete\", \"id\": \"...\"}"),
    };
    let spec = match resolve_for(&state, &session, &resource, Access::for_action(&action)) {
        Ok(spec) => spec,
        Err(resp) => return resp,
    };

    let ids = action.target_ids();
    if ids.is_empty() {
        return error_response(ServiceError::invalid("No rows selected"));
    }
    if ids.iter().any(|id| id.trim().is_empty()) {
        return error_response(ServiceError::invalid("A row id is required"));
    }

    let prompt = action.prompt(spec.label);
    let token = state
        .pending
        .open(spec.key, &session.current.user.id, action, prompt.clone())
        .await;
    ok_response(
        StatusCode::OK,
        &PendingActionResponse {
            token,
            resource: spec.key.to_string(),
            prompt,
            expires_in_secs: state.pending.ttl().as_secs(),
        },
        None,
    )
}

#[utoipa::path(
    post,
    path = "/api/actions/{token}/confirm",
    params(("token" = String, Path, description = "Token from the open-action response")),
    responses(
        (status = 200, description = "Action performed", body = ApiResponse),
        (status = 403, description = "Role no longer allows the action", body = ApiResponse),
        (status = 404, description = "Unknown, expired, foreign or already used token", body = ApiResponse),
        (status = 502, description = "Backend rejected the mutation", body = ApiResponse)
    ),
    security(("bearer" = []))
)]
pub async fn confirm_action_handler(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(token): Path<String>,
) -> Response {
    // Taken before execution so the token cannot be confirmed twice.
    let Some(pending) = state.pending.take(&token, &session.current.user.id).await else {
        return error_response(expired());
    };
    let spec = match state.resource(&pending.resource) {
        Ok(spec) => spec,
        Err(e) => return error_response(e),
    };
    if let Err(e) = authorize(&session.current, &spec, Access::for_action(&pending.action)) {
        return error_response(e);
    }

    match state.resources.perform(&spec, pending.action).await {
        Ok(outcome) => {
            info!(resource = spec.key, user = %session.current.user.id, "row action confirmed");
            let notice = outcome.notice(spec.label);
            ok_response(StatusCode::OK, &outcome, Some(notice))
        }
        Err(e) => {
            warn!(resource = spec.key, error = %e, "row action failed");
            error_response(e)
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/actions/{token}/cancel",
    params(("token" = String, Path, description = "Token from the open-action response")),
    responses(
        (status = 200, description = "Confirmation discarded", body = ApiResponse),
        (status = 404, description = "Unknown, expired or foreign token", body = ApiResponse)
    ),
    security(("bearer" = []))
)]
pub async fn cancel_action_handler(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(token): Path<String>,
) -> Response {
    if state.pending.cancel(&token, &session.current.user.id).await {
        ok_response(
            StatusCode::OK,
            &json!({ "cancelled": true }),
            Some(Notice::success("Action cancelled")),
        )
    } else {
        error_response(expired())
    }
}

/// Unknown, expired, foreign and already-used tokens look the same.
fn expired() -> ServiceError {
    ServiceError::NotFound("Confirmation".to_string())
}
