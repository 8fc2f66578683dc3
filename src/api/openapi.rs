//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, books, health, loans, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Libris API",
        version = "1.0.0",
        description = "Library lending REST API"
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::register,
        auth::login,
        auth::refresh_token,
        // Users
        users::get_profile,
        users::update_profile,
        users::list_users,
        users::update_user,
        users::delete_user,
        // Books
        books::list_books,
        books::add_book,
        books::update_book,
        books::delete_book,
        // Loans
        loans::borrow_book,
        loans::return_book,
        loans::user_borrowing_history,
        loans::admin_borrowing_history,
    ),
    components(
        schemas(
            // Auth
            auth::RegisterResponse,
            auth::LoginResponse,
            auth::RefreshRequest,
            auth::RefreshResponse,
            crate::models::user::RegisterUser,
            crate::models::user::LoginRequest,
            // Users
            users::ProfileResponse,
            crate::models::user::Role,
            crate::models::user::User,
            crate::models::user::UserShort,
            crate::models::user::UpdateProfile,
            crate::models::user::UpdateUser,
            // Books
            crate::models::book::Book,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            // Loans
            loans::LoanResponse,
            crate::models::loan::LoanDetails,
            crate::models::loan::LoanStatus,
            // Health
            health::HealthResponse,
            // Common
            crate::api::MessageResponse,
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Registration and authentication"),
        (name = "users", description = "Profiles and user management"),
        (name = "books", description = "Book catalog"),
        (name = "loans", description = "Borrowing and returns")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
