//! Borrow, return and borrowing history endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{error::AppResult, models::loan::LoanDetails};

use super::AuthenticatedUser;

/// Borrow/return response with loan details
#[derive(Serialize, ToSchema)]
pub struct LoanResponse {
    /// Status message
    pub message: String,
    /// Loan details
    pub loan: LoanDetails,
}

/// Borrow a book
#[utoipa::path(
    post,
    path = "/borrow-book/{book_id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("book_id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book borrowed", body = LoanResponse),
        (status = 400, description = "No copies available or already borrowed", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn borrow_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(book_id): Path<i32>,
) -> AppResult<Json<LoanResponse>> {
    let loan = state.services.loans.borrow(&claims, book_id).await?;

    Ok(Json(LoanResponse {
        message: "Book borrowed successfully".to_string(),
        loan,
    }))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/return-book/{book_id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("book_id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book returned", body = LoanResponse),
        (status = 404, description = "No active borrowing record found", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(book_id): Path<i32>,
) -> AppResult<Json<LoanResponse>> {
    let loan = state.services.loans.return_book(&claims, book_id).await?;

    Ok(Json(LoanResponse {
        message: "Book returned successfully".to_string(),
        loan,
    }))
}

/// Active loans of the current user
#[utoipa::path(
    get,
    path = "/user-borrowing-history",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Active loans", body = Vec<LoanDetails>),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn user_borrowing_history(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state.services.loans.my_active_loans(&claims).await?;
    Ok(Json(loans))
}

/// All active loans (admin only)
#[utoipa::path(
    get,
    path = "/admin-borrowing-history",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Active loans", body = Vec<LoanDetails>),
        (status = 403, description = "Admin privileges required", body = crate::error::ErrorResponse)
    )
)]
pub async fn admin_borrowing_history(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state.services.loans.all_active_loans(&claims).await?;
    Ok(Json(loans))
}
