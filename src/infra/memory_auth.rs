//! In-process `AuthProvider` for local development and tests.

use crate::domain::auth::{AuthProvider, AuthSession, AuthUser};
use crate::storage::error::BackendError;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

const SESSION_SECONDS: u64 = 3600;

/// A recovery email that would have been sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryEmail {
    pub email: String,
    pub redirect_to: String,
    /// Token carried by the link (`#access_token=...&type=recovery`).
    pub access_token: String,
}

impl RecoveryEmail {
    pub fn link(&self) -> String {
        format!(
            "{}#access_token={}&type=recovery",
            self.redirect_to, self.access_token
        )
    }
}

struct Account {
    user: AuthUser,
    password: String,
}

#[derive(Default)]
struct AuthState {
    accounts: HashMap<String, Account>,
    /// token -> user id
    sessions: HashMap<String, String>,
    outbox: Vec<RecoveryEmail>,
    next_id: u64,
}

impl AuthState {
    fn issue(&mut self, user_id: &str) -> String {
        let bytes: [u8; 24] = rand::random();
        let token = hex::encode(bytes);
        self.sessions.insert(token.clone(), user_id.to_string());
        token
    }

    fn user_for(&self, token: &str) -> Result<AuthUser, BackendError> {
        let id = self
            .sessions
            .get(token)
            .ok_or_else(|| BackendError::rejected(401, "Invalid or expired session"))?;
        self.accounts
            .values()
            .find(|a| &a.user.id == id)
            .map(|a| a.user.clone())
            .ok_or_else(|| BackendError::rejected(404, "User not found"))
    }
}

#[derive(Default)]
pub struct MemoryAuthProvider {
    state: Mutex<AuthState>,
}

impl MemoryAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates (or resets the password of) an account.
    pub async fn add_user(&self, email: &str, password: &str) -> AuthUser {
        let mut state = self.state.lock().await;
        let key = email.trim().to_lowercase();
        if let Some(account) = state.accounts.get_mut(&key) {
            account.password = password.to_string();
            return account.user.clone();
        }
        state.next_id += 1;
        let user = AuthUser {
            id: format!("user-{}", state.next_id),
            email: Some(key.clone()),
        };
        state.accounts.insert(
            key,
            Account {
                user: user.clone(),
                password: password.to_string(),
            },
        );
        user
    }

    pub async fn sent_recoveries(&self) -> Vec<RecoveryEmail> {
        self.state.lock().await.outbox.clone()
    }
}

#[async_trait]
impl AuthProvider for MemoryAuthProvider {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, BackendError> {
        let mut state = self.state.lock().await;
        let key = email.trim().to_lowercase();
        let user = match state.accounts.get(&key) {
            Some(a) if a.password == password => a.user.clone(),
            _ => return Err(BackendError::rejected(400, "Invalid login credentials")),
        };
        let access_token = state.issue(&user.id);
        Ok(AuthSession {
            access_token,
            refresh_token: None,
            expires_in: Some(SESSION_SECONDS),
            user,
        })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        self.state.lock().await.sessions.remove(access_token);
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, BackendError> {
        self.state.lock().await.user_for(access_token)
    }

    async fn send_password_reset(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        let key = email.trim().to_lowercase();
        // Unknown addresses succeed silently so accounts cannot be probed.
        let Some(user_id) = state.accounts.get(&key).map(|a| a.user.id.clone()) else {
            return Ok(());
        };
        let access_token = state.issue(&user_id);
        state.outbox.push(RecoveryEmail {
            email: key,
            redirect_to: redirect_to.to_string(),
            access_token,
        });
        Ok(())
    }

    async fn update_password(
        &self,
        access_token: &str,
        new_password: &str,
    ) -> Result<AuthUser, BackendError> {
        let mut state = self.state.lock().await;
        let user = state.user_for(access_token)?;
        if new_password.chars().count() < 6 {
            return Err(BackendError::rejected(
                422,
                "Password should be at least 6 characters",
            ));
        }
        if let Some(account) = state.accounts.values_mut().find(|a| a.user.id == user.id) {
            account.password = new_password.to_string();
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recovery_token_allows_password_change() {
        let auth = MemoryAuthProvider::new();
        auth.add_user("head@school.test", "old-password").await;

        auth.send_password_reset("head@school.test", "http://app/reset-password")
            .await
            .unwrap();
        let mail = auth.sent_recoveries().await.pop().unwrap();
        assert!(mail.link().ends_with("&type=recovery"));

        auth.update_password(&mail.access_token, "new-password")
            .await
            .unwrap();
        assert!(auth
            .sign_in_with_password("head@school.test", "old-password")
            .await
            .is_err());
        assert!(auth
            .sign_in_with_password("HEAD@school.test", "new-password")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn sign_out_invalidates_the_token() {
        let auth = MemoryAuthProvider::new();
        auth.add_user("a@b.test", "secret-1").await;
        let session = auth.sign_in_with_password("a@b.test", "secret-1").await.unwrap();
        assert!(auth.get_user(&session.access_token).await.is_ok());
        auth.sign_out(&session.access_token).await.unwrap();
        assert_eq!(
            auth.get_user(&session.access_token).await.unwrap_err().status(),
            Some(401)
        );
    }
}
