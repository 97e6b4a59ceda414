//! Resource descriptions, form validation, attachments, confirmations and
//! auth contracts. Nothing in here talks to the network directly.

pub mod auth;
pub mod confirm;
pub mod files;
pub mod form;
pub mod notice;
pub mod resource;
