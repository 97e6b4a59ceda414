use crate::app::RecoveryInput;
use crate::domain::auth::{AccessLevel, AuthSession, AuthUser, CurrentUser, Permissions};
use crate::domain::confirm::{ConfirmPrompt, ConfirmVariant, RowAction};
use crate::domain::notice::{Notice, NoticeLevel};
use crate::transport::http::handlers::{actions, auth, health, resources};
use crate::transport::http::middleware::auth_middleware;
use crate::transport::http::types::{
    ApiResponse, AppState, AttachmentDescriptor, FieldDescriptor, ForgotPasswordRequest,
    PageResponse, PendingActionResponse, ResourceDescriptor, SignInRequest,
};
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Room for a handful of 5 MB gallery images in one request.
pub const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthcheck_handler,
        auth::sign_in_handler,
        auth::sign_out_handler,
        auth::me_handler,
        auth::forgot_password_handler,
        auth::reset_password_handler,
        auth::set_password_handler,
        resources::list_resources_handler,
        resources::list_handler,
        resources::get_handler,
        resources::create_handler,
        resources::update_handler,
        resources::append_attachments_handler,
        actions::open_action_handler,
        actions::confirm_action_handler,
        actions::cancel_action_handler
    ),
    components(schemas(
        ApiResponse,
        Notice,
        NoticeLevel,
        SignInRequest,
        ForgotPasswordRequest,
        RecoveryInput,
        AuthSession,
        AuthUser,
        CurrentUser,
        Permissions,
        AccessLevel,
        PageResponse,
        ResourceDescriptor,
        FieldDescriptor,
        AttachmentDescriptor,
        RowAction,
        ConfirmPrompt,
        ConfirmVariant,
        PendingActionResponse
    )),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::healthcheck_handler))
        .route("/auth/sign-in", post(auth::sign_in_handler))
        .route("/auth/sign-out", post(auth::sign_out_handler))
        .route("/auth/me", get(auth::me_handler))
        .route("/auth/forgot-password", post(auth::forgot_password_handler))
        .route("/auth/reset-password", post(auth::reset_password_handler))
        .route("/auth/set-password", post(auth::set_password_handler))
        .route("/api/resources", get(resources::list_resources_handler))
        .route(
            "/api/resources/:resource",
            get(resources::list_handler).post(resources::create_handler),
        )
        .route(
            "/api/resources/:resource/actions",
            post(actions::open_action_handler),
        )
        .route(
            "/api/resources/:resource/:id",
            get(resources::get_handler).put(resources::update_handler),
        )
        .route(
            "/api/resources/:resource/:id/attachments",
            post(resources::append_attachments_handler),
        )
        .route("/api/actions/:token/confirm", post(actions::confirm_action_handler))
        .route("/api/actions/:token/cancel", post(actions::cancel_action_handler))
        .layer(middleware::from_fn_with_state(app_state.clone(), auth_middleware))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(app_state)
}
