use crate::app::RecoveryInput;
use crate::domain::notice::Notice;
use crate::transport::http::types::{
    error_response, json_422, ok_response, ApiResponse, AppState, ForgotPasswordRequest, Session,
    SignInRequest,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::{Extension, Json};
use serde_json::json;

#[utoipa::path(
    post,
    path = "/auth/sign-in",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in; `data` is the session", body = ApiResponse),
        (status = 400, description = "Missing or malformed email/password", body = ApiResponse),
        (status = 401, description = "Invalid credentials", body = ApiResponse)
    )
)]
pub async fn sign_in_handler(
    State(state): State<AppState>,
    request: Result<Json<SignInRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => return json_422(e, "{\"email\": \"...\", \"password\": \"...\"}"),
    };
    match state.auth.sign_in(&request.email, &request.password).await {
        Ok(session) => ok_response(
            StatusCode::OK,
            &session,
            Some(Notice::success("Signed in successfully")),
        ),
        Err(e) => error_response(e),
    }
}

#[utoipa::path(
    post,
    path = "/auth/sign-out",
    responses(
        (status = 200, description = "Session ended", body = ApiResponse),
        (status = 401, description = "No valid session", body = ApiResponse)
    ),
    security(("bearer" = []))
)]
pub async fn sign_out_handler(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Response {
    match state.auth.sign_out(&session.access_token).await {
        Ok(()) => ok_response(
            StatusCode::OK,
            &json!({ "signed_out": true }),
            Some(Notice::success("Signed out")),
        ),
        Err(e) => error_response(e),
    }
}

#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current user and permissions (null when no role is assigned)", body = ApiResponse),
        (status = 401, description = "No valid session", body = ApiResponse)
    ),
    security(("bearer" = []))
)]
pub async fn me_handler(Extension(session): Extension<Session>) -> Response {
    ok_response(StatusCode::OK, &session.current, None)
}

#[utoipa::path(
    post,
    path = "/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Recovery email requested", body = ApiResponse),
        (status = 400, description = "Missing or malformed email", body = ApiResponse)
    )
)]
pub async fn forgot_password_handler(
    State(state): State<AppState>,
    request: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => return json_422(e, "{\"email\": \"...\"}"),
    };
    match state.auth.forgot_password(&request.email).await {
        Ok(()) => ok_response(
            StatusCode::OK,
            &json!({ "redirect_to": state.auth.reset_redirect() }),
            Some(Notice::success("Password reset link sent. Please check your email.")),
        ),
        Err(e) => error_response(e),
    }
}

#[utoipa::path(
    post,
    path = "/auth/reset-password",
    request_body = RecoveryInput,
    responses(
        (status = 200, description = "Password updated", body = ApiResponse),
        (status = 400, description = "Password rules not met", body = ApiResponse),
        (status = 401, description = "Invalid or expired reset link", body = ApiResponse)
    )
)]
pub async fn reset_password_handler(
    State(state): State<AppState>,
    request: Result<Json<RecoveryInput>, JsonRejection>,
) -> Response {
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => return json_422(e, RECOVERY_SHAPE),
    };
    match state.auth.reset_password(&request).await {
        Ok(()) => password_updated(),
        Err(e) => error_response(e),
    }
}

#[utoipa::path(
    post,
    path = "/auth/set-password",
    request_body = RecoveryInput,
    responses(
        (status = 200, description = "Password set for an invited account", body = ApiResponse),
        (status = 400, description = "Password rules not met", body = ApiResponse),
        (status = 401, description = "Invalid or expired setup link", body = ApiResponse)
    )
)]
pub async fn set_password_handler(
    State(state): State<AppState>,
    request: Result<Json<RecoveryInput>, JsonRejection>,
) -> Response {
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => return json_422(e, RECOVERY_SHAPE),
    };
    match state.auth.set_password(&request).await {
        Ok(()) => password_updated(),
        Err(e) => error_response(e),
    }
}

const RECOVERY_SHAPE: &str =
    "{\"access_token\": \"...\", \"type\": \"recovery\", \"password\": \"...\", \"confirm_password\": \"...\"}";

fn password_updated() -> Response {
    ok_response(
        StatusCode::OK,
        &json!({ "password_updated": true }),
        Some(Notice::success("Password updated successfully")),
    )
}
