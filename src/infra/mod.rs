pub mod backend;
pub mod config;
pub mod memory_auth;
pub mod supabase;
