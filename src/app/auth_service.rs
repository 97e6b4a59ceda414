//! Sign-in, session lookup, password recovery and role gating.

use crate::app::error::ServiceError;
use crate::domain::auth::{AccessLevel, AuthProvider, AuthSession, CurrentUser};
use crate::domain::confirm::RowAction;
use crate::domain::form::ValidationErrors;
use crate::domain::resource::{tables, ResourceSpec};
use crate::infra::backend::Backend;
use crate::storage::database::{json_as_text, Database, SelectQuery};
use crate::storage::error::BackendError;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;
use validator::ValidateEmail;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const RECOVERY_TOKEN_TYPE: &str = "recovery";

pub const INVALID_RESET_LINK: &str =
    "Invalid or expired reset link. Please request a new password reset.";
pub const INVALID_SETUP_LINK: &str =
    "Invalid or expired setup link. Please contact your administrator.";
const INVALID_SESSION: &str = "Invalid or expired session";

/// Fields carried by a recovery or invitation link plus the new password.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RecoveryInput {
    pub access_token: String,
    /// The link's `type` parameter.
    #[serde(alias = "type", default)]
    pub token_type: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Create,
    Edit,
    Delete,
}

impl Access {
    pub fn for_action(action: &RowAction) -> Self {
        if action.is_delete() {
            Access::Delete
        } else {
            Access::Edit
        }
    }
}

/// Every resource route needs a resolved role; `users_roles` also needs
/// user management rights.
pub fn authorize(user: &CurrentUser, spec: &ResourceSpec, access: Access) -> Result<(), ServiceError> {
    let Some(perms) = &user.permissions else {
        return Err(ServiceError::Forbidden(
            "Your account has no assigned role".to_string(),
        ));
    };
    if spec.admin_only && !perms.can_manage_users {
        return Err(ServiceError::Forbidden(
            "Only administrators can manage users".to_string(),
        ));
    }
    let allowed = match access {
        Access::Read => true,
        Access::Create => perms.can_create,
        Access::Edit => perms.can_edit,
        Access::Delete => perms.can_delete,
    };
    if allowed {
        Ok(())
    } else {
        let verb = match access {
            Access::Read => "view",
            Access::Create => "create",
            Access::Edit => "edit",
            Access::Delete => "delete",
        };
        Err(ServiceError::Forbidden(format!(
            "{} accounts cannot {} {}",
            perms.role.as_str(),
            verb,
            spec.plural
        )))
    }
}

fn check_email(email: &str, errors: &mut ValidationErrors) {
    if email.is_empty() {
        errors.add("email", "Email is required");
    } else if !email.validate_email() {
        errors.add("email", "Invalid email format");
    }
}

fn is_session_error(e: &BackendError) -> bool {
    matches!(e.status(), Some(401) | Some(403))
}

#[derive(Clone)]
pub struct AuthService {
    auth: Arc<dyn AuthProvider>,
    db: Arc<dyn Database>,
    app_url: String,
}

impl AuthService {
    pub fn new(auth: Arc<dyn AuthProvider>, db: Arc<dyn Database>, app_url: impl Into<String>) -> Self {
        Self {
            auth,
            db,
            app_url: app_url.into(),
        }
    }

    pub fn from_backend(backend: &Backend, app_url: impl Into<String>) -> Self {
        Self::new(backend.auth.clone(), backend.db.clone(), app_url)
    }

    /// Where recovery emails send the user.
    pub fn reset_redirect(&self) -> String {
        format!("{}/reset-password", self.app_url.trim_end_matches('/'))
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, ServiceError> {
        let email = email.trim();
        let mut errors = ValidationErrors::new();
        check_email(email, &mut errors);
        if password.is_empty() {
            errors.add("password", "Password is required");
        }
        if !errors.is_empty() {
            return Err(ServiceError::Validation(errors));
        }

        match self.auth.sign_in_with_password(email, password).await {
            Ok(session) => {
                info!(user = %session.user.id, "signed in");
                Ok(session)
            }
            Err(e @ BackendError::Rejected { status: 400..=403, .. }) => {
                Err(ServiceError::Unauthorized(e.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn sign_out(&self, access_token: &str) -> Result<(), ServiceError> {
        self.auth.sign_out(access_token).await?;
        Ok(())
    }

    /// Resolves the session and the role row. A missing role row is not an
    /// error; the user simply has no permissions.
    pub async fn current_user(&self, access_token: &str) -> Result<CurrentUser, ServiceError> {
        let user = match self.auth.get_user(access_token).await {
            Ok(user) => user,
            Err(e) if is_session_error(&e) => {
                return Err(ServiceError::Unauthorized(INVALID_SESSION.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let mut level = self.access_level("user_id", &user.id).await?;
        if level.is_none() {
            if let Some(email) = user.email.as_deref() {
                level = self.access_level("email", email).await?;
            }
        }
        if level.is_none() {
            warn!(user = %user.id, "no role row for user");
        }

        Ok(CurrentUser {
            permissions: level.map(AccessLevel::permissions),
            user,
        })
    }

    async fn access_level(&self, column: &str, value: &str) -> Result<Option<AccessLevel>, BackendError> {
        let query = SelectQuery::all()
            .columns(&["access_level"])
            .eq(column, value)
            .range(0, 0);
        let result = self.db.select(tables::USERS_ROLES, &query).await?;
        Ok(result
            .rows
            .first()
            .and_then(|row| row.get("access_level"))
            .map(json_as_text)
            .and_then(|s| AccessLevel::parse(&s)))
    }

    pub async fn forgot_password(&self, email: &str) -> Result<(), ServiceError> {
        let email = email.trim();
        let mut errors = ValidationErrors::new();
        check_email(email, &mut errors);
        if !errors.is_empty() {
            return Err(ServiceError::Validation(errors));
        }
        self.auth
            .send_password_reset(email, &self.reset_redirect())
            .await?;
        info!("password reset email requested");
        Ok(())
    }

    pub async fn reset_password(&self, input: &RecoveryInput) -> Result<(), ServiceError> {
        self.complete_recovery(input, INVALID_RESET_LINK).await
    }

    /// First password for an invited account. Same flow as a reset.
    pub async fn set_password(&self, input: &RecoveryInput) -> Result<(), ServiceError> {
        self.complete_recovery(input, INVALID_SETUP_LINK).await
    }

    async fn complete_recovery(&self, input: &RecoveryInput, invalid_link: &str) -> Result<(), ServiceError> {
        let mut errors = ValidationErrors::new();
        if input.password.is_empty() {
            errors.add("password", "Password is required");
        } else if input.password.chars().count() < MIN_PASSWORD_LEN {
            errors.add("password", "Password must be at least 8 characters");
        }
        if input.confirm_password.is_empty() {
            errors.add("confirm_password", "Please confirm your password");
        } else if input.confirm_password != input.password {
            errors.add("confirm_password", "Passwords must match");
        }
        if !errors.is_empty() {
            return Err(ServiceError::Validation(errors));
        }

        let token = input.access_token.trim();
        if token.is_empty() || input.token_type != RECOVERY_TOKEN_TYPE {
            return Err(ServiceError::Unauthorized(invalid_link.to_string()));
        }
        match self.auth.get_user(token).await {
            Ok(_) => {}
            Err(e) if is_session_error(&e) => {
                return Err(ServiceError::Unauthorized(invalid_link.to_string()))
            }
            Err(e) => return Err(e.into()),
        }

        let user = self.auth.update_password(token, &input.password).await?;
        info!(user = %user.id, "password updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resource::catalog;
    use crate::infra::memory_auth::MemoryAuthProvider;
    use crate::storage::database::Row;
    use crate::storage::memory::MemoryDatabase;
    use serde_json::json;

    async fn service() -> (Arc<MemoryAuthProvider>, Arc<MemoryDatabase>, AuthService) {
        let auth = Arc::new(MemoryAuthProvider::new());
        let db = Arc::new(MemoryDatabase::new());
        let svc = AuthService::new(auth.clone(), db.clone(), "http://localhost:3001/");
        (auth, db, svc)
    }

    fn role_row(pairs: serde_json::Value) -> Row {
        pairs.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn sign_in_validates_before_calling_out() {
        let (_auth, _db, svc) = service().await;
        match svc.sign_in("", "").await.unwrap_err() {
            ServiceError::Validation(errors) => {
                assert_eq!(errors.get("email"), Some("Email is required"));
                assert_eq!(errors.get("password"), Some("Password is required"));
            }
            other => panic!("unexpected {:?}", other),
        }
        match svc.sign_in("nope", "x").await.unwrap_err() {
            ServiceError::Validation(errors) => {
                assert_eq!(errors.get("email"), Some("Invalid email format"))
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            svc.sign_in("who@school.test", "wrong-pass").await,
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn role_falls_back_to_email() {
        let (auth, db, svc) = service().await;
        auth.add_user("editor@school.test", "password-1").await;
        db.insert(
            tables::USERS_ROLES,
            role_row(json!({"email": "editor@school.test", "access_level": "Editor"})),
        )
        .await
        .unwrap();

        let session = svc.sign_in("editor@school.test", "password-1").await.unwrap();
        let me = svc.current_user(&session.access_token).await.unwrap();
        let perms = me.permissions.unwrap();
        assert_eq!(perms.role, AccessLevel::Editor);

        let jobs = catalog::jobs();
        assert!(authorize(&me, &jobs, Access::Edit).is_ok());
        assert!(matches!(
            authorize(&me, &jobs, Access::Delete),
            Err(ServiceError::Forbidden(_))
        ));
        assert!(authorize(&me, &catalog::users_roles(), Access::Read).is_err());
    }

    #[tokio::test]
    async fn no_role_row_means_no_access() {
        let (auth, _db, svc) = service().await;
        auth.add_user("new@school.test", "password-1").await;
        let session = svc.sign_in("new@school.test", "password-1").await.unwrap();
        let me = svc.current_user(&session.access_token).await.unwrap();
        assert!(me.permissions.is_none());
        assert!(authorize(&me, &catalog::jobs(), Access::Read).is_err());

        assert!(matches!(
            svc.current_user("bogus").await,
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn reset_flow() {
        let (auth, _db, svc) = service().await;
        auth.add_user("head@school.test", "old-password").await;
        svc.forgot_password("head@school.test").await.unwrap();
        let mail = auth.sent_recoveries().await.pop().unwrap();
        assert_eq!(mail.redirect_to, "http://localhost:3001/reset-password");

        let mut input = RecoveryInput {
            access_token: mail.access_token.clone(),
            token_type: "recovery".into(),
            password: "new-password".into(),
            confirm_password: "new-passw0rd".into(),
        };
        match svc.reset_password(&input).await.unwrap_err() {
            ServiceError::Validation(errors) => {
                assert_eq!(errors.get("confirm_password"), Some("Passwords must match"))
            }
            other => panic!("unexpected {:?}", other),
        }

        input.confirm_password = input.password.clone();
        input.token_type = "signup".into();
        match svc.reset_password(&input).await.unwrap_err() {
            ServiceError::Unauthorized(msg) => assert_eq!(msg, INVALID_RESET_LINK),
            other => panic!("unexpected {:?}", other),
        }

        input.token_type = "recovery".into();
        svc.reset_password(&input).await.unwrap();
        assert!(svc.sign_in("head@school.test", "new-password").await.is_ok());
    }
}
