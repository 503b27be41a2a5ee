use crate::api::models::users::Role;
use crate::provisioning::ProvisionError;
use crate::stores::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided, or the credential was rejected
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Caller is authenticated but does not hold the required role
    #[error("Insufficient permissions: {required:?} role required")]
    InsufficientPermissions { required: Role },

    /// Invalid request data
    #[error("{message}")]
    BadRequest { message: String },

    /// Route exists but the method is not supported
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// External store failure outside the provisioning flow (e.g. role lookup)
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Provisioning saga failure
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::InsufficientPermissions { .. } => StatusCode::FORBIDDEN,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Provision(err) => match err {
                ProvisionError::MissingCredentials => StatusCode::BAD_REQUEST,
                // The identity store's own rejection (duplicate email, weak
                // password) is the caller's problem; everything else is ours.
                ProvisionError::Identity(StoreError::Rejected { .. }) => StatusCode::BAD_REQUEST,
                ProvisionError::Identity(_) => StatusCode::INTERNAL_SERVER_ERROR,
                ProvisionError::Profile { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Unauthorized".to_string()),
            Error::InsufficientPermissions { .. } => "Forbidden: Admin access required".to_string(),
            Error::BadRequest { message } => message.clone(),
            Error::MethodNotAllowed => "Method not allowed".to_string(),
            Error::Internal { .. } | Error::Store(_) | Error::Other(_) => "Internal server error".to_string(),
            Error::Provision(err) => match err {
                ProvisionError::MissingCredentials => "Email and password are required".to_string(),
                ProvisionError::Identity(StoreError::Rejected { message, .. }) => message.clone(),
                ProvisionError::Identity(_) => "Failed to create user".to_string(),
                ProvisionError::Profile { source, .. } => format!("Failed to create profile: {source}"),
            },
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Internal { .. } | Error::Store(_) | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Provision(ProvisionError::MissingCredentials)
            | Error::Provision(ProvisionError::Identity(StoreError::Rejected { .. })) => {
                tracing::debug!("Provisioning rejected: {}", self);
            }
            Error::Provision(_) => {
                tracing::error!("Provisioning failed: {:#}", self);
            }
            Error::Unauthenticated { .. } | Error::InsufficientPermissions { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::BadRequest { .. } | Error::MethodNotAllowed => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();

        // Every error body is `{"error": ...}`; the catch-all additionally
        // carries the context chain so callers can report something useful.
        let body = match &self {
            Error::Other(source) => json!({
                "error": self.user_message(),
                "details": format!("{source:#}"),
            }),
            _ => json!({ "error": self.user_message() }),
        };

        (status, Json(body)).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
