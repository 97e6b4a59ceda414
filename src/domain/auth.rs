//! Authentication collaborator contract and role-based permissions.

use crate::storage::error::BackendError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds until `access_token` expires, when the provider reports it.
    #[serde(default)]
    pub expires_in: Option<u64>,
    pub user: AuthUser,
}

/// Hosted session/token authentication.
///
/// Tokens are opaque bearer strings; a recovery link carries an access token
/// of the same kind, so password reset is `get_user` followed by
/// `update_password` with that token.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, BackendError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError>;

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, BackendError>;

    /// Emails a recovery link that lands on `redirect_to`.
    async fn send_password_reset(&self, email: &str, redirect_to: &str)
        -> Result<(), BackendError>;

    async fn update_password(
        &self,
        access_token: &str,
        new_password: &str,
    ) -> Result<AuthUser, BackendError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum AccessLevel {
    Admin,
    Editor,
    Viewer,
}

impl AccessLevel {
    pub const ALL: [&'static str; 3] = ["Admin", "Editor", "Viewer"];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "Admin" => Some(AccessLevel::Admin),
            "Editor" => Some(AccessLevel::Editor),
            "Viewer" => Some(AccessLevel::Viewer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Admin => "Admin",
            AccessLevel::Editor => "Editor",
            AccessLevel::Viewer => "Viewer",
        }
    }

    pub fn permissions(self) -> Permissions {
        let admin = self == AccessLevel::Admin;
        let writer = admin || self == AccessLevel::Editor;
        Permissions {
            role: self,
            can_create: writer,
            can_edit: writer,
            can_delete: admin,
            can_manage_users: admin,
            can_access_settings: admin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Permissions {
    pub role: AccessLevel,
    pub can_create: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_manage_users: bool,
    pub can_access_settings: bool,
}

/// Signed-in user plus the permissions derived from their `users_roles` row.
/// `permissions` is `None` when no role row exists for the user.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CurrentUser {
    pub user: AuthUser,
    pub permissions: Option<Permissions>,
}
