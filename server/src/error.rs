use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};

use crate::credentials::CredentialError;
use crate::db::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(&'static str),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    NotFound(&'static str),

    #[error("Authentication required")]
    Unauthorized,

    #[error("{message}: {source}")]
    Storage {
        message: &'static str,
        #[source]
        source: StorageError,
    },

    #[error("{message}: {source}")]
    Credential {
        message: &'static str,
        #[source]
        source: CredentialError,
    },
}

impl ApiError {
    /// Body sent to the client. Internal failures collapse to the route's
    /// generic message.
    fn public_message(&self) -> String {
        match self {
            ApiError::Storage { message, .. } | ApiError::Credential { message, .. } => {
                (*message).to_string()
            }
            other => other.to_string(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidCredentials | ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Storage { .. } | ApiError::Credential { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("{}", self);
        }

        HttpResponse::build(status)
            .content_type("text/plain; charset=utf-8")
            .body(self.public_message())
    }
}

/// Attaches a route's generic failure message to a lower-layer error.
pub trait Context<T> {
    fn context(self, message: &'static str) -> Result<T>;
}

impl<T> Context<T> for std::result::Result<T, StorageError> {
    fn context(self, message: &'static str) -> Result<T> {
        self.map_err(|source| ApiError::Storage { message, source })
    }
}

impl<T> Context<T> for std::result::Result<T, CredentialError> {
    fn context(self, message: &'static str) -> Result<T> {
        self.map_err(|source| ApiError::Credential { message, source })
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
