use crate::app::{AuthService, ResourceService, ServiceError};
use crate::domain::auth::CurrentUser;
use crate::domain::confirm::{ConfirmPrompt, PendingActions};
use crate::domain::notice::Notice;
use crate::domain::resource::{ResourceRegistry, ResourceSpec};
use crate::infra::backend::Backend;
use crate::storage::error::BackendError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::error;
use utoipa::{IntoParams, ToSchema};

#[derive(Clone)]
pub struct AppState {
    pub resources: ResourceService,
    pub auth: AuthService,
    pub registry: Arc<ResourceRegistry>,
    pub pending: Arc<PendingActions>,
    pub backend: Backend,
}

impl AppState {
    pub fn new(backend: Backend, app_url: &str) -> Self {
        Self {
            resources: ResourceService::from_backend(&backend),
            auth: AuthService::from_backend(&backend, app_url),
            registry: Arc::new(ResourceRegistry::school()),
            pending: Arc::new(PendingActions::default()),
            backend,
        }
    }

    pub fn resource(&self, key: &str) -> Result<Arc<ResourceSpec>, ServiceError> {
        self.registry
            .get(key.trim())
            .ok_or_else(|| ServiceError::UnknownResource(key.to_string()))
    }
}

/// Signed-in caller, placed in request extensions by the auth middleware.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub current: CurrentUser,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub data: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
}

impl ApiResponse {
    pub fn ok(data: Option<JsonValue>, notice: Option<Notice>) -> Self {
        Self {
            success: true,
            data,
            error: None,
            notice,
        }
    }

    pub fn fail(error: impl Into<String>, data: Option<JsonValue>, notice: Option<Notice>) -> Self {
        Self {
            success: false,
            data,
            error: Some(error.into()),
            notice,
        }
    }
}

/// Serializes `value` as the envelope's `data`; 500 if that fails.
pub fn ok_response<T: Serialize>(status: StatusCode, value: &T, notice: Option<Notice>) -> Response {
    match serde_json::to_value(value) {
        Ok(data) => (status, Json(ApiResponse::ok(Some(data), notice))).into_response(),
        Err(e) => {
            error!(error = %e, "failed to serialize response");
            let message = format!("Failed to serialize response: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::fail(message.clone(), None, Some(Notice::error(message)))),
            )
                .into_response()
        }
    }
}

pub fn status_for(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::Validation(_) | ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        ServiceError::NotFound(_) | ServiceError::UnknownResource(_) => StatusCode::NOT_FOUND,
        ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
        ServiceError::Backend(BackendError::NotConfigured(_)) => StatusCode::SERVICE_UNAVAILABLE,
        ServiceError::Backend(_) => StatusCode::BAD_GATEWAY,
    }
}

/// Validation failures carry `data.errors` (field -> message) and no
/// notice; everything else carries a notice.
pub fn error_response(err: ServiceError) -> Response {
    let status = status_for(&err);
    let body = match err {
        ServiceError::Validation(errors) => ApiResponse::fail(
            "Validation failed",
            Some(serde_json::json!({ "errors": errors })),
            None,
        ),
        other => ApiResponse::fail(other.to_string(), None, Some(other.notice())),
    };
    (status, Json(body)).into_response()
}

pub fn json_422(err: JsonRejection, expected: &str) -> Response {
    let message = format!("Invalid JSON body: {} (expected: {})", err, expected);
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ApiResponse::fail(message.clone(), None, Some(Notice::error(message)))),
    )
        .into_response()
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct SignInRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Deserialize, Debug, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// 1-based page number (default 1).
    pub page: Option<u64>,
    /// Rows per page, 1..=100 (default 10).
    pub page_size: Option<u64>,
    /// Case-insensitive substring matched against the resource's search columns.
    pub search: Option<String>,
    /// Parent record id; required for job applications.
    pub parent_id: Option<String>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct PageResponse {
    #[schema(value_type = Vec<Object>)]
    pub rows: Vec<JsonValue>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub page_count: u64,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct PendingActionResponse {
    /// Pass to `/api/actions/{token}/confirm` or `/cancel`.
    pub token: String,
    pub resource: String,
    pub prompt: ConfirmPrompt,
    pub expires_in_secs: u64,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct FieldDescriptor {
    pub name: String,
    pub label: String,
    pub kind: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct AttachmentDescriptor {
    pub column: String,
    pub multiple: bool,
    /// Picker accept filter, e.g. `application/pdf,image/*`.
    pub accept: String,
    pub max_bytes: u64,
    pub required: bool,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ResourceDescriptor {
    pub key: String,
    pub label: String,
    pub plural: String,
    pub fields: Vec<FieldDescriptor>,
    pub search_columns: Vec<String>,
    pub attachment: Option<AttachmentDescriptor>,
    pub statuses: Vec<String>,
    pub visibility: bool,
    pub display_code: Option<String>,
    pub parent: Option<String>,
    pub admin_only: bool,
}

impl From<&ResourceSpec> for ResourceDescriptor {
    fn from(spec: &ResourceSpec) -> Self {
        Self {
            key: spec.key.to_string(),
            label: spec.label.to_string(),
            plural: spec.plural.to_string(),
            fields: spec
                .fields
                .iter()
                .map(|f| FieldDescriptor {
                    name: f.name.to_string(),
                    label: f.label.to_string(),
                    kind: f.kind.as_str().to_string(),
                    required: f.is_required(),
                    choices: f.choices.iter().map(|c| c.to_string()).collect(),
                })
                .collect(),
            search_columns: spec.search_columns(),
            attachment: spec.attachment.as_ref().map(|a| AttachmentDescriptor {
                column: a.column.to_string(),
                multiple: a.is_multiple(),
                accept: a.policy.accept.iter().map(|r| r.accept()).collect::<Vec<_>>().join(","),
                max_bytes: a.policy.max_bytes,
                required: a.required_on_create.is_some(),
            }),
            statuses: spec
                .status
                .as_ref()
                .map(|s| s.values.iter().map(|v| v.to_string()).collect())
                .unwrap_or_default(),
            visibility: spec.visibility,
            display_code: spec.display_code.as_ref().map(|d| d.column.to_string()),
            parent: spec.parent.as_ref().map(|p| p.column.to_string()),
            admin_only: spec.admin_only,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn unserializable_data_reports_the_cause() {
        // Non-string map keys cannot become JSON object keys.
        let data: HashMap<(u8, u8), u8> = HashMap::from([((1, 2), 3)]);
        let resp = ok_response(StatusCode::OK, &data, None);
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: JsonValue = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        let message = body["notice"]["message"].as_str().unwrap();
        assert!(message.starts_with("Failed to serialize response"));
        assert_eq!(body["notice"]["message"], body["error"]);
    }
}
