use thiserror::Error;

/// Failure reported by one of the backend collaborators (database, object
/// storage, auth provider).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("backend is not configured: {0}")]
    NotConfigured(String),

    #[error("request failed: {0}")]
    Transport(String),

    /// The backend answered but refused the operation. `message` is the
    /// backend-provided text and is shown to the user verbatim.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected backend response: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        BackendError::Rejected {
            status,
            message: message.into(),
        }
    }

    /// HTTP-ish status of a rejection, if the backend supplied one.
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BackendError::Decode(e.to_string())
        } else {
            BackendError::Transport(e.to_string())
        }
    }
}

impl From<sqlx::Error> for BackendError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(db) => BackendError::Rejected {
                status: 400,
                message: db.message().to_string(),
            },
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                BackendError::Decode(e.to_string())
            }
            other => BackendError::Transport(other.to_string()),
        }
    }
}
