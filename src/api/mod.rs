//! API handlers for Libris REST endpoints

pub mod auth;
pub mod books;
pub mod health;
pub mod loans;
pub mod openapi;
pub mod users;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
    routing::{delete, get, post, put},
    Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::ToSchema;

use crate::{error::AppError, models::user::UserClaims, AppState};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // Get the Authorization header
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                AppError::Authentication("Authentication credentials were not provided".to_string())
            })?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Authentication("Invalid authorization header format".to_string())
        })?;

        let claims = state.services.auth.authorize(token.trim())?;
        Ok(AuthenticatedUser(claims))
    }
}

/// JSON body extractor whose rejections use the application error format
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// Plain confirmation body
#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// Create the application router with all routes
pub fn router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let routes = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Authentication
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/token/refresh", post(auth::refresh_token))
        // Users
        .route("/profile", get(users::get_profile))
        .route("/update-profile", put(users::update_profile))
        .route("/users", get(users::list_users))
        .route("/update-user/:user_id", put(users::update_user))
        .route("/delete-user/:user_id", delete(users::delete_user))
        // Books
        .route("/books", get(books::list_books))
        .route("/add-book", post(books::add_book))
        .route("/update-book/:book_id", put(books::update_book))
        .route("/delete-book/:book_id", delete(books::delete_book))
        // Loans
        .route("/borrow-book/:book_id", post(loans::borrow_book))
        .route("/return-book/:book_id", post(loans::return_book))
        .route("/user-borrowing-history", get(loans::user_borrowing_history))
        .route("/admin-borrowing-history", get(loans::admin_borrowing_history))
        .with_state(state);

    Router::new()
        .merge(routes)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
