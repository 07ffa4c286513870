use crate::db::errors::StoreError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Malformed request: missing claim id, no file parts, unreadable multipart body
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested file or claim has nothing stored
    #[error("{message}")]
    NotFound { message: String },

    /// A single uploaded file exceeded the configured size limit
    #[error("{message}")]
    PayloadTooLarge { message: String },

    /// A dependency (store, extraction API) could not be reached
    #[error("{message}")]
    Unavailable { message: String },

    /// The extraction API answered, but not with success
    #[error("{message}")]
    BadGateway { message: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Blob store error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::BadGateway { .. } => StatusCode::BAD_GATEWAY,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Store(store_err) => match store_err {
                StoreError::NotFound => StatusCode::NOT_FOUND,
                StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                StoreError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::BadRequest { message }
            | Error::NotFound { message }
            | Error::PayloadTooLarge { message }
            | Error::Unavailable { message }
            | Error::BadGateway { message } => message.clone(),
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Store(store_err) => match store_err {
                StoreError::NotFound => "File not found".to_string(),
                StoreError::Unavailable(_) => "File store unavailable".to_string(),
                StoreError::Other(_) => "File store error occurred".to_string(),
            },
            Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Store(StoreError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Store(StoreError::Unavailable(_)) | Error::Unavailable { .. } | Error::BadGateway { .. } => {
                tracing::warn!("Upstream error: {}", self);
            }
            Error::Store(StoreError::NotFound) | Error::BadRequest { .. } | Error::NotFound { .. } | Error::PayloadTooLarge { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        (status, Json(json!({ "error": self.user_message() }))).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
