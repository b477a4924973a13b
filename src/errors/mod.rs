//! Error handling module for the CourseMaker backend.
//!
//! Every failure the service can raise is one variant of [`AppError`]. Each variant maps to exactly
//! one HTTP status code and one error code, which the boundary renders as a response envelope.

use std::fmt;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const INVALID_ARGUMENT: &str = "INVALID_ARGUMENT";
    pub const DUPLICATED: &str = "DUPLICATED";
    pub const COURSE_NOT_FOUND: &str = "COURSE_NOT_FOUND";
    pub const MEMBER_NOT_FOUND: &str = "MEMBER_NOT_FOUND";
    pub const DESTINATION_NOT_FOUND: &str = "DESTINATION_NOT_FOUND";
    pub const TAG_NOT_FOUND: &str = "TAG_NOT_FOUND";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const SEARCH_ERROR: &str = "SEARCH_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// The kind of record a lookup failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Course,
    Member,
    Destination,
    Tag,
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// Authentication required
    Unauthorized(String),
    /// A field of a course request broke one of its rules
    InvalidArgument { message: String, detail: String },
    /// A record with the same unique key already exists
    Duplicated { message: String, detail: String },
    /// A referenced record does not exist
    NotFound {
        resource: Resource,
        message: String,
        detail: String,
    },
    /// Malformed request outside the course rules
    BadRequest(String),
    /// Database error
    Database(String),
    /// Search index error
    Search(String),
    /// Internal server error
    Internal(String),
}

impl AppError {
    pub fn invalid_argument(message: impl Into<String>, detail: impl Into<String>) -> Self {
        AppError::InvalidArgument {
            message: message.into(),
            detail: detail.into(),
        }
    }

    pub fn duplicated(message: impl Into<String>, detail: impl Into<String>) -> Self {
        AppError::Duplicated {
            message: message.into(),
            detail: detail.into(),
        }
    }

    pub fn not_found(
        resource: Resource,
        message: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        AppError::NotFound {
            resource,
            message: message.into(),
            detail: detail.into(),
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
            AppError::Duplicated { .. } => StatusCode::CONFLICT,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Search(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => codes::UNAUTHORIZED,
            AppError::InvalidArgument { .. } => codes::INVALID_ARGUMENT,
            AppError::Duplicated { .. } => codes::DUPLICATED,
            AppError::NotFound { resource, .. } => match resource {
                Resource::Course => codes::COURSE_NOT_FOUND,
                Resource::Member => codes::MEMBER_NOT_FOUND,
                Resource::Destination => codes::DESTINATION_NOT_FOUND,
                Resource::Tag => codes::TAG_NOT_FOUND,
            },
            AppError::BadRequest(_) => codes::BAD_REQUEST,
            AppError::Database(_) => codes::DATABASE_ERROR,
            AppError::Search(_) => codes::SEARCH_ERROR,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Get the human-readable error message.
    pub fn message(&self) -> String {
        match self {
            AppError::Unauthorized(msg) => msg.clone(),
            AppError::InvalidArgument { message, .. } => message.clone(),
            AppError::Duplicated { message, .. } => message.clone(),
            AppError::NotFound { message, .. } => message.clone(),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Database(msg) => msg.clone(),
            AppError::Search(msg) => msg.clone(),
            AppError::Internal(msg) => msg.clone(),
        }
    }

    /// Get the machine-oriented detail naming the offending field or key, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            AppError::InvalidArgument { detail, .. }
            | AppError::Duplicated { detail, .. }
            | AppError::NotFound { detail, .. } => Some(detail),
            _ => None,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.detail() {
            Some(detail) => write!(f, "{}: {} ({})", self.error_code(), self.message(), detail),
            None => write!(f, "{}: {}", self.error_code(), self.message()),
        }
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        AppError::Database(format!("Database error: {}", err))
    }
}

impl From<tantivy::TantivyError> for AppError {
    fn from(err: tantivy::TantivyError) -> Self {
        tracing::error!("Search error: {:?}", err);
        AppError::Search(format!("Search error: {}", err))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Whether a database error is a UNIQUE constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
    pub status: u16,
}

impl ErrorResponse {
    pub fn new(error: &AppError) -> Self {
        Self {
            success: false,
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message: error.message(),
                detail: error.detail().map(str::to_string),
            },
            status: error.status_code().as_u16(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::new(&self);
        (status, Json(body)).into_response()
    }
}
