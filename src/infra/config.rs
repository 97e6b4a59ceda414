//! Centralized configuration (environment variables + defaults).
//!
//! Nothing here panics: a missing backend URL or key yields an unconfigured
//! backend at startup, not a crash.

pub const DEFAULT_BUCKET: &str = "AISPPUR";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_APP_URL: &str = "http://localhost:3001";

fn var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn first_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|n| var(n))
}

/// Hosted project URL (`SUPABASE_URL`, or the browser-prefixed variant).
pub fn supabase_url() -> Option<String> {
    first_var(&["SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"])
        .map(|u| u.trim_end_matches('/').to_string())
}

/// Anonymous API key.
pub fn supabase_anon_key() -> Option<String> {
    first_var(&["SUPABASE_ANON_KEY", "NEXT_PUBLIC_SUPABASE_ANON_KEY"])
}

/// Optional service-role key; used for database and storage calls when set.
pub fn supabase_service_role_key() -> Option<String> {
    var("SUPABASE_SERVICE_ROLE_KEY")
}

pub fn storage_bucket() -> String {
    var("STORAGE_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string())
}

/// Direct Postgres connection; when set, rows are read and written through
/// it instead of the hosted REST API.
pub fn database_url() -> Option<String> {
    var("DATABASE_URL")
}

pub fn bind_addr() -> String {
    var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
}

/// Public URL of the front-end, used to build password-reset links.
pub fn app_url() -> String {
    first_var(&["APP_URL", "NEXT_PUBLIC_APP_URL"])
        .unwrap_or_else(|| DEFAULT_APP_URL.to_string())
        .trim_end_matches('/')
        .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Hosted,
    /// Everything in process (`BACKEND=memory`).
    Memory,
}

pub fn backend_kind() -> BackendKind {
    match var("BACKEND").map(|v| v.to_ascii_lowercase()).as_deref() {
        Some("memory") => BackendKind::Memory,
        _ => BackendKind::Hosted,
    }
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub supabase_url: Option<String>,
    pub anon_key: Option<String>,
    pub service_role_key: Option<String>,
    pub bucket: String,
    pub database_url: Option<String>,
}

impl BackendConfig {
    pub fn from_env() -> Self {
        Self {
            kind: backend_kind(),
            supabase_url: supabase_url(),
            anon_key: supabase_anon_key(),
            service_role_key: supabase_service_role_key(),
            bucket: storage_bucket(),
            database_url: database_url(),
        }
    }

    pub fn memory() -> Self {
        Self {
            kind: BackendKind::Memory,
            supabase_url: None,
            anon_key: None,
            service_role_key: None,
            bucket: DEFAULT_BUCKET.to_string(),
            database_url: None,
        }
    }

    /// Names of the variables the hosted backend still needs.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.kind == BackendKind::Memory {
            return missing;
        }
        if self.supabase_url.is_none() {
            missing.push("SUPABASE_URL");
        }
        if self.anon_key.is_none() {
            missing.push("SUPABASE_ANON_KEY");
        }
        missing
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub bind_addr: String,
    pub app_url: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            backend: BackendConfig::from_env(),
            bind_addr: bind_addr(),
            app_url: app_url(),
        }
    }
}

/// `SEED_ADMIN_EMAIL` / `SEED_ADMIN_PASSWORD`: an Admin account created at
/// startup when running on the memory backend.
pub fn seed_admin() -> Option<(String, String)> {
    Some((var("SEED_ADMIN_EMAIL")?, var("SEED_ADMIN_PASSWORD")?))
}
