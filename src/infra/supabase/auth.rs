//! `AuthProvider` over the hosted auth API.

use crate::domain::auth::{AuthProvider, AuthSession, AuthUser};
use crate::infra::supabase::{check, SupabaseClient};
use crate::storage::error::BackendError;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;

pub struct SupabaseAuth {
    client: SupabaseClient,
}

impl SupabaseAuth {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AuthProvider for SupabaseAuth {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, BackendError> {
        let resp = self
            .client
            .user_request(Method::POST, "/auth/v1/token", None)
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        let resp = self
            .client
            .user_request(Method::POST, "/auth/v1/logout", Some(access_token))
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, BackendError> {
        let resp = self
            .client
            .user_request(Method::GET, "/auth/v1/user", Some(access_token))
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn send_password_reset(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), BackendError> {
        let resp = self
            .client
            .user_request(Method::POST, "/auth/v1/recover", None)
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({ "email": email }))
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn update_password(
        &self,
        access_token: &str,
        new_password: &str,
    ) -> Result<AuthUser, BackendError> {
        let resp = self
            .client
            .user_request(Method::PUT, "/auth/v1/user", Some(access_token))
            .json(&json!({ "password": new_password }))
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }
}
