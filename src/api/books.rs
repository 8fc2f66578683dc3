//! Book catalog endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::book::{Book, CreateBook, UpdateBook},
};

use super::{AppJson, AuthenticatedUser, MessageResponse};

/// List all books
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    responses(
        (status = 200, description = "All books", body = Vec<Book>)
    )
)]
pub async fn list_books(State(state): State<crate::AppState>) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.catalog.list_books().await?;
    Ok(Json(books))
}

/// Add a book (admin only)
#[utoipa::path(
    post,
    path = "/add-book",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid input or duplicate ISBN", body = crate::error::ErrorResponse),
        (status = 403, description = "Admin privileges required", body = crate::error::ErrorResponse)
    )
)]
pub async fn add_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppJson(book): AppJson<CreateBook>,
) -> AppResult<(StatusCode, Json<Book>)> {
    let created = state.services.catalog.add_book(&claims, book).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Partially update a book (admin only)
#[utoipa::path(
    put,
    path = "/update-book/{book_id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("book_id" = i32, Path, description = "Book ID")
    ),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 403, description = "Admin privileges required", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(book_id): Path<i32>,
    AppJson(update): AppJson<UpdateBook>,
) -> AppResult<Json<Book>> {
    let updated = state.services.catalog.update_book(&claims, book_id, update).await?;
    Ok(Json(updated))
}

/// Delete a book and its borrowing history (admin only)
#[utoipa::path(
    delete,
    path = "/delete-book/{book_id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("book_id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book deleted", body = MessageResponse),
        (status = 403, description = "Admin privileges required", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(book_id): Path<i32>,
) -> AppResult<Json<MessageResponse>> {
    state.services.catalog.delete_book(&claims, book_id).await?;
    Ok(Json(MessageResponse::new("Book deleted successfully")))
}
