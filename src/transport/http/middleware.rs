//! Bearer-token authentication.
//!
//! Extracts `Authorization: Bearer <token>`, resolves the user and their role
//! through `AuthService`, and stores a `Session` in request extensions.

use crate::app::ServiceError;
use crate::transport::http::types::{error_response, AppState, Session};
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if is_public_path(request.uri().path()) {
        return next.run(request).await;
    }

    let Some(token) = bearer_token(&request) else {
        return error_response(ServiceError::Unauthorized(
            "Missing authorization token".to_string(),
        ));
    };

    match state.auth.current_user(&token).await {
        Ok(current) => {
            request.extensions_mut().insert(Session {
                access_token: token,
                current,
            });
            next.run(request).await
        }
        Err(e) => error_response(e),
    }
}

fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn is_public_path(path: &str) -> bool {
    matches!(
        path,
        "/health"
            | "/auth/sign-in"
            | "/auth/forgot-password"
            | "/auth/reset-password"
            | "/auth/set-password"
    ) || path.starts_with("/swagger-ui")
        || path.starts_with("/api-docs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_paths() {
        assert!(is_public_path("/health"));
        assert!(is_public_path("/auth/sign-in"));
        assert!(is_public_path("/swagger-ui/index.html"));
        assert!(!is_public_path("/auth/me"));
        assert!(!is_public_path("/api/resources/jobs"));
    }
}
