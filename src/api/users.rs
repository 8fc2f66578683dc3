//! Profile and user management endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::user::{UpdateProfile, UpdateUser, User},
};

use super::{AppJson, AuthenticatedUser, MessageResponse};

/// Profile update response
#[derive(Serialize, ToSchema)]
pub struct ProfileResponse {
    pub message: String,
    pub user: User,
}

/// Get own profile
#[utoipa::path(
    get,
    path = "/profile",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_profile(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<User>> {
    let user = state.services.users.get_profile(&claims).await?;
    Ok(Json(user))
}

/// Update own profile (username, email, password)
#[utoipa::path(
    put,
    path = "/update-profile",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = UpdateProfile,
    responses(
        (status = 200, description = "Profile updated", body = ProfileResponse),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_profile(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppJson(profile): AppJson<UpdateProfile>,
) -> AppResult<Json<ProfileResponse>> {
    let user = state.services.users.update_profile(&claims, profile).await?;

    Ok(Json(ProfileResponse {
        message: "User details updated successfully".to_string(),
        user,
    }))
}

/// List all users (admin only)
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All users", body = Vec<User>),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse),
        (status = 403, description = "Admin privileges required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_users(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<User>>> {
    let users = state.services.users.list_users(&claims).await?;
    Ok(Json(users))
}

/// Change a user's role or active flag (admin only)
#[utoipa::path(
    put,
    path = "/update-user/{user_id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("user_id" = i32, Path, description = "User ID")
    ),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 403, description = "Admin privileges required", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(user_id): Path<i32>,
    AppJson(update): AppJson<UpdateUser>,
) -> AppResult<Json<User>> {
    let user = state.services.users.update_user(&claims, user_id, update).await?;
    Ok(Json(user))
}

/// Delete a user and their borrowing history (admin only)
#[utoipa::path(
    delete,
    path = "/delete-user/{user_id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("user_id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 403, description = "Admin privileges required", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(user_id): Path<i32>,
) -> AppResult<Json<MessageResponse>> {
    state.services.users.delete_user(&claims, user_id).await?;
    Ok(Json(MessageResponse::new("User deleted successfully")))
}
