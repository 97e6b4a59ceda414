//! Builds the backend collaborators once at startup.

use crate::domain::auth::{AccessLevel, AuthProvider, AuthSession, AuthUser};
use crate::domain::resource::tables;
use crate::infra::config::{BackendConfig, BackendKind};
use crate::infra::memory_auth::MemoryAuthProvider;
use crate::infra::supabase::{PostgrestDatabase, SupabaseAuth, SupabaseClient, SupabaseStorage};
use crate::storage::database::{Database, Filter, Row, SelectQuery, SelectResult};
use crate::storage::error::BackendError;
use crate::storage::memory::{MemoryDatabase, MemoryObjectStorage};
use crate::storage::objects::{public_object_url, ObjectStorage};
use crate::storage::postgres::PgDatabase;
use async_trait::async_trait;
use axum::body::Bytes;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    Hosted,
    /// Rows through `DATABASE_URL`; files and auth through the hosted API.
    DirectPostgres,
    Memory,
    Unconfigured,
}

impl BackendMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendMode::Hosted => "hosted",
            BackendMode::DirectPostgres => "postgres",
            BackendMode::Memory => "memory",
            BackendMode::Unconfigured => "unconfigured",
        }
    }
}

#[derive(Clone)]
pub struct Backend {
    pub mode: BackendMode,
    pub db: Arc<dyn Database>,
    pub storage: Arc<dyn ObjectStorage>,
    pub auth: Arc<dyn AuthProvider>,
}

impl Backend {
    /// Picks implementations from configuration. Missing settings produce
    /// collaborators that fail every call with `NotConfigured`.
    pub fn from_config(config: &BackendConfig) -> Self {
        if config.kind == BackendKind::Memory {
            info!("using in-process memory backend");
            return Self::memory(&config.bucket);
        }

        let hosted = match (&config.supabase_url, &config.anon_key) {
            (Some(url), Some(key)) => Some(SupabaseClient::new(
                url.clone(),
                key.clone(),
                config.service_role_key.clone(),
            )),
            _ => {
                warn!(missing = ?config.missing(), "hosted backend is not configured");
                None
            }
        };

        let direct = config
            .database_url
            .as_deref()
            .and_then(|url| match PgDatabase::connect_lazy(url) {
                Ok(db) => Some(db),
                Err(e) => {
                    warn!(error = %e, "DATABASE_URL is set but unusable");
                    None
                }
            });

        let unconfigured = Arc::new(Unconfigured::new(&config.bucket));
        let storage: Arc<dyn ObjectStorage> = match &hosted {
            Some(client) => Arc::new(SupabaseStorage::new(client.clone(), config.bucket.clone())),
            None => unconfigured.clone(),
        };
        let auth: Arc<dyn AuthProvider> = match &hosted {
            Some(client) => Arc::new(SupabaseAuth::new(client.clone())),
            None => unconfigured.clone(),
        };
        let (mode, db): (BackendMode, Arc<dyn Database>) = match (direct, &hosted) {
            (Some(pg), _) => (BackendMode::DirectPostgres, Arc::new(pg)),
            (None, Some(client)) => (
                BackendMode::Hosted,
                Arc::new(PostgrestDatabase::new(client.clone())),
            ),
            (None, None) => (BackendMode::Unconfigured, unconfigured),
        };

        info!(mode = mode.as_str(), bucket = %config.bucket, "backend ready");
        Self {
            mode,
            db,
            storage,
            auth,
        }
    }

    pub fn memory(bucket: &str) -> Self {
        MemoryBackend::new(bucket).backend()
    }

    /// Cheapest possible round-trip to the database.
    pub async fn ping(&self) -> Result<(), BackendError> {
        self.db
            .select(
                tables::USERS_ROLES,
                &SelectQuery::all().columns(&["id"]).range(0, 0),
            )
            .await
            .map(|_| ())
    }
}

/// In-process collaborators with their concrete types still reachable, for
/// seeding and failure injection.
#[derive(Clone)]
pub struct MemoryBackend {
    pub db: Arc<MemoryDatabase>,
    pub storage: Arc<MemoryObjectStorage>,
    pub auth: Arc<MemoryAuthProvider>,
}

impl MemoryBackend {
    pub fn new(bucket: &str) -> Self {
        Self {
            db: Arc::new(MemoryDatabase::new()),
            storage: Arc::new(MemoryObjectStorage::new(bucket)),
            auth: Arc::new(MemoryAuthProvider::new()),
        }
    }

    pub fn backend(&self) -> Backend {
        Backend {
            mode: BackendMode::Memory,
            db: self.db.clone(),
            storage: self.storage.clone(),
            auth: self.auth.clone(),
        }
    }

    /// Creates a sign-in account plus its `users_roles` row.
    pub async fn add_account(
        &self,
        email: &str,
        password: &str,
        level: AccessLevel,
    ) -> Result<AuthUser, BackendError> {
        let user = self.auth.add_user(email, password).await;
        let row = json!({
            "user_id": user.id,
            "name": email,
            "email": user.email,
            "role": level.as_str(),
            "department": "Office",
            "access_level": level.as_str(),
            "status": "Active",
        });
        if let JsonValue::Object(row) = row {
            self.db.insert(tables::USERS_ROLES, row).await?;
        }
        Ok(user)
    }
}

/// Stand-in for every collaborator when configuration is missing.
pub struct Unconfigured {
    bucket: String,
}

impl Unconfigured {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
        }
    }

    fn err<T>(&self) -> Result<T, BackendError> {
        Err(BackendError::NotConfigured(
            "set SUPABASE_URL and SUPABASE_ANON_KEY".to_string(),
        ))
    }
}

#[async_trait]
impl Database for Unconfigured {
    async fn select(&self, _table: &str, _query: &SelectQuery) -> Result<SelectResult, BackendError> {
        self.err()
    }

    async fn insert(&self, _table: &str, _row: Row) -> Result<Row, BackendError> {
        self.err()
    }

    async fn update(
        &self,
        _table: &str,
        _filters: &[Filter],
        _patch: Row,
    ) -> Result<Vec<Row>, BackendError> {
        self.err()
    }

    async fn delete(&self, _table: &str, _filters: &[Filter]) -> Result<Vec<Row>, BackendError> {
        self.err()
    }
}

#[async_trait]
impl ObjectStorage for Unconfigured {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn upload(&self, _path: &str, _content_type: &str, _data: Bytes) -> Result<(), BackendError> {
        self.err()
    }

    fn public_url(&self, path: &str) -> String {
        public_object_url("", &self.bucket, path)
    }

    async fn remove(&self, _paths: &[String]) -> Result<Vec<String>, BackendError> {
        self.err()
    }
}

#[async_trait]
impl AuthProvider for Unconfigured {
    async fn sign_in_with_password(&self, _email: &str, _password: &str) -> Result<AuthSession, BackendError> {
        self.err()
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), BackendError> {
        self.err()
    }

    async fn get_user(&self, _access_token: &str) -> Result<AuthUser, BackendError> {
        self.err()
    }

    async fn send_password_reset(&self, _email: &str, _redirect_to: &str) -> Result<(), BackendError> {
        self.err()
    }

    async fn update_password(&self, _access_token: &str, _new_password: &str) -> Result<AuthUser, BackendError> {
        self.err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_configuration_does_not_panic() {
        let config = BackendConfig {
            kind: BackendKind::Hosted,
            supabase_url: None,
            anon_key: None,
            service_role_key: None,
            bucket: "AISPPUR".to_string(),
            database_url: None,
        };
        let backend = Backend::from_config(&config);
        assert_eq!(backend.mode, BackendMode::Unconfigured);
        assert!(matches!(
            backend.ping().await,
            Err(BackendError::NotConfigured(_))
        ));
        assert!(matches!(
            backend.auth.get_user("t").await,
            Err(BackendError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn memory_accounts_get_a_role_row() {
        let memory = MemoryBackend::new("AISPPUR");
        let user = memory
            .add_account("admin@school.test", "admin-pass", AccessLevel::Admin)
            .await
            .unwrap();
        let rows = memory.db.rows(tables::USERS_ROLES).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["user_id"], user.id.as_str());
        assert_eq!(rows[0]["access_level"], "Admin");
        assert!(memory.backend().ping().await.is_ok());
    }
}
