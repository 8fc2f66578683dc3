//! Registration, login and token refresh endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::user::{LoginRequest, RegisterUser, User},
};

use super::AppJson;

/// Registration response
#[derive(Serialize, ToSchema)]
pub struct RegisterResponse {
    pub message: String,
    pub user: User,
}

/// Login response
#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub user: User,
    #[serde(rename = "accessToken")]
    pub access_token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

/// Refresh request
#[derive(Deserialize, ToSchema)]
pub struct RefreshRequest {
    /// Refresh token issued at login
    pub refresh: String,
}

/// Refresh response
#[derive(Serialize, ToSchema)]
pub struct RefreshResponse {
    #[serde(rename = "accessToken")]
    pub access_token: String,
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/register",
    tag = "auth",
    request_body = RegisterUser,
    responses(
        (status = 201, description = "User registered", body = RegisterResponse),
        (status = 400, description = "Invalid input or email already used", body = crate::error::ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<crate::AppState>,
    AppJson(request): AppJson<RegisterUser>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let user = state.services.auth.register(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully".to_string(),
            user,
        }),
    ))
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 401, description = "Invalid email or password", body = crate::error::ErrorResponse),
        (status = 403, description = "Account deactivated", body = crate::error::ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<crate::AppState>,
    AppJson(request): AppJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let (user, tokens) = state.services.auth.login(request).await?;

    Ok(Json(LoginResponse {
        user,
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
    }))
}

/// Exchange a refresh token for a new access token
#[utoipa::path(
    post,
    path = "/token/refresh",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = RefreshResponse),
        (status = 401, description = "Invalid or expired refresh token", body = crate::error::ErrorResponse)
    )
)]
pub async fn refresh_token(
    State(state): State<crate::AppState>,
    AppJson(request): AppJson<RefreshRequest>,
) -> AppResult<Json<RefreshResponse>> {
    let access_token = state.services.auth.refresh(&request.refresh).await?;
    Ok(Json(RefreshResponse { access_token }))
}
