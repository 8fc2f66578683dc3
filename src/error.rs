//! Error types for Libris server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use sqlx::error::ErrorKind;
use thiserror::Error;

/// Machine-readable error codes carried in every error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthenticated = 2,
    Forbidden = 3,
    DbFailure = 4,
    NotFound = 5,
    BadValue = 6,
    NoCopiesAvailable = 7,
    AllCopiesReturned = 8,
    InvalidCredentials = 9,
    AccountDeactivated = 10,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("User account is deactivated")]
    AccountDeactivated,

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No copies available")]
    NoCopiesAvailable,

    #[error("All copies are already returned")]
    AllCopiesAlreadyReturned,

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        // Constraint violations are caller mistakes, not infrastructure failures
        if let Some(db) = e.as_database_error() {
            match db.kind() {
                ErrorKind::UniqueViolation | ErrorKind::CheckViolation => {
                    return AppError::Validation(constraint_message(db.constraint()).to_string());
                }
                _ => {}
            }
        }
        AppError::Database(e)
    }
}

fn constraint_message(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("users_email_key") => "A user with this email already exists",
        Some("books_isbn_key") => "A book with this ISBN already exists",
        Some("books_available_copies_range") => {
            "Available copies must be between 0 and total copies"
        }
        Some("loans_one_active_per_user_book") => "You have already borrowed this book",
        _ => "Invalid value",
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthenticated, msg.clone())
            }
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                ErrorCode::InvalidCredentials,
                "Invalid email or password".to_string(),
            ),
            AppError::AccountDeactivated => (
                StatusCode::FORBIDDEN,
                ErrorCode::AccountDeactivated,
                "User account is deactivated".to_string(),
            ),
            AppError::Authorization(msg) => {
                (StatusCode::FORBIDDEN, ErrorCode::Forbidden, msg.clone())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorCode::NotFound, msg.clone()),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::NoCopiesAvailable => (
                StatusCode::BAD_REQUEST,
                ErrorCode::NoCopiesAvailable,
                "No copies available".to_string(),
            ),
            AppError::AllCopiesAlreadyReturned => (
                StatusCode::BAD_REQUEST,
                ErrorCode::AllCopiesReturned,
                "All copies are already returned".to_string(),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
