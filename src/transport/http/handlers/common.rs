use crate::app::{authorize, Access, ServiceError};
use crate::domain::form::{AttachmentMode, FormValues, UploadedFile};
use crate::domain::resource::ResourceSpec;
use crate::storage::database::json_as_text;
use crate::transport::http::types::{error_response, json_422, AppState, Session};
use axum::async_trait;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use axum::response::Response;
use axum::Json;
use serde_json::Value as JsonValue;
use std::sync::Arc;

pub const PARENT_ID_KEY: &str = "parent_id";
pub const ATTACHMENT_MODE_KEY: &str = "attachment_mode";

/// Looks up the resource and checks the caller may perform `access` on it.
pub fn resolve_for(
    state: &AppState,
    session: &Session,
    resource: &str,
    access: Access,
) -> Result<Arc<ResourceSpec>, Response> {
    let spec = state.resource(resource).map_err(error_response)?;
    authorize(&session.current, &spec, access).map_err(error_response)?;
    Ok(spec)
}

/// A create/edit form body: `multipart/form-data` (text parts plus file
/// parts) or a flat JSON object of field values.
#[derive(Debug, Default)]
pub struct FormSubmission {
    pub values: FormValues,
    pub files: Vec<UploadedFile>,
    pub parent_id: Option<String>,
    pub attachment_mode: Option<String>,
}

impl FormSubmission {
    fn set(&mut self, name: String, value: String) {
        match name.as_str() {
            PARENT_ID_KEY => self.parent_id = Some(value),
            ATTACHMENT_MODE_KEY => self.attachment_mode = Some(value),
            _ => {
                self.values.insert(name, value);
            }
        }
    }

    pub fn mode(&self) -> Result<Option<AttachmentMode>, ServiceError> {
        match self.attachment_mode.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => AttachmentMode::parse(raw).map(Some).ok_or_else(|| {
                ServiceError::invalid(format!(
                    "attachment_mode must be one of keep, replace, append, remove (got '{}')",
                    raw
                ))
            }),
        }
    }
}

fn bad_multipart(e: impl std::fmt::Display) -> Response {
    error_response(ServiceError::invalid(format!("Invalid multipart body: {}", e)))
}

#[async_trait]
impl<S> FromRequest<S> for FormSubmission
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("multipart/form-data"))
            .unwrap_or(false);

        let mut submission = FormSubmission::default();

        if multipart {
            let mut form = Multipart::from_request(req, state)
                .await
                .map_err(bad_multipart)?;
            while let Some(field) = form.next_field().await.map_err(bad_multipart)? {
                let name = field.name().unwrap_or_default().to_string();
                match field.file_name().map(str::to_string) {
                    Some(file_name) => {
                        let content_type = field.content_type().map(str::to_string);
                        let data = field.bytes().await.map_err(bad_multipart)?;
                        // An untouched file input still sends an empty part.
                        if file_name.is_empty() && data.is_empty() {
                            continue;
                        }
                        submission
                            .files
                            .push(UploadedFile::new(file_name, content_type.as_deref(), data));
                    }
                    None => {
                        let text = field.text().await.map_err(bad_multipart)?;
                        submission.set(name, text);
                    }
                }
            }
            return Ok(submission);
        }

        let Json(body) = Json::<serde_json::Map<String, JsonValue>>::from_request(req, state)
            .await
            .map_err(|e| json_422(e, "{\"field\": \"value\", ...}"))?;
        for (name, value) in body {
            let text = match &value {
                JsonValue::Array(_) | JsonValue::Object(_) => value.to_string(),
                other => json_as_text(other),
            };
            submission.set(name, text);
        }
        Ok(submission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_keys_are_split_out() {
        let mut s = FormSubmission::default();
        s.set("title".into(), "Exams".into());
        s.set(PARENT_ID_KEY.into(), "4".into());
        s.set(ATTACHMENT_MODE_KEY.into(), "Append".into());
        assert_eq!(s.values.len(), 1);
        assert_eq!(s.parent_id.as_deref(), Some("4"));
        assert_eq!(s.mode().unwrap(), Some(AttachmentMode::Append));

        s.attachment_mode = Some("merge".into());
        assert!(s.mode().is_err());
    }
}
