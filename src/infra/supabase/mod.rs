//! Hosted backend over HTTP: REST rows, object storage and auth.

pub mod auth;
pub mod rest;
pub mod storage;

pub use auth::SupabaseAuth;
pub use rest::PostgrestDatabase;
pub use storage::SupabaseStorage;

use crate::storage::error::BackendError;
use reqwest::{Method, RequestBuilder, Response};
use serde_json::Value as JsonValue;

/// Shared HTTP client and credentials for one hosted project.
#[derive(Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    service_role_key: Option<String>,
}

impl SupabaseClient {
    pub fn new(
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        service_role_key: Option<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            service_role_key,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    /// Key for server-side data calls: the service-role key when configured.
    fn data_key(&self) -> &str {
        self.service_role_key.as_deref().unwrap_or(&self.anon_key)
    }

    /// Request authenticated with the server-side key.
    pub(crate) fn data_request(&self, method: Method, path: &str) -> RequestBuilder {
        let key = self.data_key();
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", key)
            .bearer_auth(key)
    }

    /// Request on behalf of a signed-in user (`Authorization: Bearer <token>`),
    /// or anonymous when `access_token` is `None`.
    pub(crate) fn user_request(
        &self,
        method: Method,
        path: &str,
        access_token: Option<&str>,
    ) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token.unwrap_or(&self.anon_key))
    }
}

/// Pulls the human-readable message out of an error body.
fn error_message(body: &str) -> Option<String> {
    let v: JsonValue = serde_json::from_str(body).ok()?;
    ["message", "msg", "error_description", "error"]
        .iter()
        .find_map(|k| v.get(*k).and_then(|m| m.as_str()).map(str::to_string))
}

/// Passes successful responses through; turns others into `Rejected` with
/// the backend's own message.
pub(crate) async fn check(resp: Response) -> Result<Response, BackendError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| {
        if body.trim().is_empty() {
            format!("request failed with status {}", status)
        } else {
            body
        }
    });
    Err(BackendError::rejected(status, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_bodies() {
        assert_eq!(
            error_message(r#"{"code":"23505","message":"duplicate key"}"#).as_deref(),
            Some("duplicate key")
        );
        assert_eq!(
            error_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#)
                .as_deref(),
            Some("Invalid login credentials")
        );
        assert_eq!(error_message("not json"), None);
    }
}
