//! Shared harness: memory backend, seeded accounts, router on an ephemeral port.

#![allow(dead_code)]

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use school_backoffice::domain::auth::AccessLevel;
use school_backoffice::transport;
use school_backoffice::MemoryBackend;
use serde_json::{json, Value};

pub const ADMIN_EMAIL: &str = "admin@school.test";
pub const EDITOR_EMAIL: &str = "editor@school.test";
pub const VIEWER_EMAIL: &str = "viewer@school.test";
pub const PASSWORD: &str = "correct-horse";
pub const APP_URL: &str = "http://localhost:3001";

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub struct TestApp {
    pub base_url: String,
    pub client: Client,
    pub memory: MemoryBackend,
}

impl TestApp {
    pub async fn spawn() -> Result<Self, Box<dyn std::error::Error>> {
        let memory = MemoryBackend::new("AISPPUR");
        memory.add_account(ADMIN_EMAIL, PASSWORD, AccessLevel::Admin).await?;
        memory.add_account(EDITOR_EMAIL, PASSWORD, AccessLevel::Editor).await?;
        memory.add_account(VIEWER_EMAIL, PASSWORD, AccessLevel::Viewer).await?;

        let app_state = transport::http::AppState::new(memory.backend(), APP_URL);
        let router = transport::http::create_router(app_state);

        // Bind to an ephemeral port to avoid conflicts with a running server.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}", port),
            client: Client::new(),
            memory,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Signs in and returns the bearer token.
    pub async fn sign_in(&self, email: &str) -> Result<String, Box<dyn std::error::Error>> {
        let resp = self
            .client
            .post(self.url("/auth/sign-in"))
            .json(&json!({ "email": email, "password": PASSWORD }))
            .send()
            .await?;
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await?;
        let token = body["data"]["access_token"]
            .as_str()
            .ok_or("sign-in response has no access_token")?;
        Ok(token.to_string())
    }

    pub async fn admin(&self) -> Result<String, Box<dyn std::error::Error>> {
        self.sign_in(ADMIN_EMAIL).await
    }

    pub async fn get(&self, token: &str, path: &str) -> Result<(u16, Value), Box<dyn std::error::Error>> {
        let resp = self.client.get(self.url(path)).bearer_auth(token).send().await?;
        let status = resp.status().as_u16();
        Ok((status, resp.json().await?))
    }

    pub async fn post_json(
        &self,
        token: &str,
        path: &str,
        body: &Value,
    ) -> Result<(u16, Value), Box<dyn std::error::Error>> {
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        let status = resp.status().as_u16();
        Ok((status, resp.json().await?))
    }

    pub async fn put_json(
        &self,
        token: &str,
        path: &str,
        body: &Value,
    ) -> Result<(u16, Value), Box<dyn std::error::Error>> {
        let resp = self
            .client
            .put(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        let status = resp.status().as_u16();
        Ok((status, resp.json().await?))
    }

    pub async fn send_form(
        &self,
        token: &str,
        method: reqwest::Method,
        path: &str,
        form: Form,
    ) -> Result<(u16, Value), Box<dyn std::error::Error>> {
        let resp = self
            .client
            .request(method, self.url(path))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;
        let status = resp.status().as_u16();
        Ok((status, resp.json().await?))
    }

    /// Opens a row action and confirms it in one go.
    pub async fn confirm_action(
        &self,
        token: &str,
        resource: &str,
        action: Value,
    ) -> Result<(u16, Value), Box<dyn std::error::Error>> {
        let (status, opened) = self
            .post_json(token, &format!("/api/resources/{}/actions", resource), &action)
            .await?;
        assert_eq!(status, 200, "open action failed: {}", opened);
        let action_token = opened["data"]["token"]
            .as_str()
            .ok_or("open action response has no token")?
            .to_string();
        self.post_json(token, &format!("/api/actions/{}/confirm", action_token), &json!({}))
            .await
    }
}

pub fn form(fields: &[(&str, &str)]) -> Form {
    fields.iter().fold(Form::new(), |form, (name, value)| {
        form.text(name.to_string(), value.to_string())
    })
}

pub fn file_part(name: &str, content_type: &str, bytes: usize) -> Part {
    Part::bytes(vec![7u8; bytes])
        .file_name(name.to_string())
        .mime_str(content_type)
        .unwrap()
}

pub fn job(title: &str, department: &str) -> Value {
    json!({
        "title": title,
        "department": department,
        "subject": "Mathematics",
        "description": "Teaches grades 9 and 10",
        "last_date_to_apply": "2026-12-31",
        "job_type": "Regular"
    })
}

/// Row id as used in URLs.
pub fn row_id(row: &Value) -> String {
    match &row["id"] {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
