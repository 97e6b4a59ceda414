use crate::domain::form::ValidationErrors;
use crate::domain::notice::Notice;
use crate::storage::error::BackendError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// Input rejected before any backend call.
    #[error("{}", .0.first().unwrap_or("Invalid input"))]
    Validation(ValidationErrors),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Unknown resource '{0}'")]
    UnknownResource(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ServiceError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ServiceError::InvalidRequest(message.into())
    }

    pub fn field(field: &str, message: &str) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, message);
        ServiceError::Validation(errors)
    }

    /// Failure toast. Backend rejections carry the backend's own message.
    pub fn notice(&self) -> Notice {
        Notice::error(self.to_string())
    }
}
