//! `ObjectStorage` over the hosted storage API.

use crate::infra::supabase::{check, SupabaseClient};
use crate::storage::error::BackendError;
use crate::storage::objects::{encode_object_path, public_object_url, ObjectStorage};
use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;

pub struct SupabaseStorage {
    client: SupabaseClient,
    bucket: String,
}

#[derive(Deserialize)]
struct RemovedObject {
    name: String,
}

impl SupabaseStorage {
    pub fn new(client: SupabaseClient, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn upload(
        &self,
        path: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<(), BackendError> {
        let resp = self
            .client
            .data_request(
                Method::POST,
                &format!("/storage/v1/object/{}/{}", self.bucket, encode_object_path(path)),
            )
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(data)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        public_object_url(self.client.base_url(), &self.bucket, path)
    }

    async fn remove(&self, paths: &[String]) -> Result<Vec<String>, BackendError> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        let resp = self
            .client
            .data_request(Method::DELETE, &format!("/storage/v1/object/{}", self.bucket))
            .json(&json!({ "prefixes": paths }))
            .send()
            .await?;
        let removed: Vec<RemovedObject> = check(resp).await?.json().await?;
        Ok(removed.into_iter().map(|o| o.name).collect())
    }
}
