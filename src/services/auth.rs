//! Authentication service: registration, login and token handling

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use serde::Serialize;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{LoginRequest, RegisterUser, TokenType, User, UserClaims},
    repository::Repository,
};

use super::validate_request;

/// Token pair issued at login
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Register a new account (role defaults to `User`)
    pub async fn register(&self, request: RegisterUser) -> AppResult<User> {
        validate_request(&request)?;

        let (Some(username), Some(email), Some(password)) =
            (request.username, request.email, request.password)
        else {
            return Err(AppError::Validation("This field is required".to_string()));
        };

        if self.repository.users.email_exists(&email, None).await? {
            return Err(AppError::Validation(
                "A user with this email already exists".to_string(),
            ));
        }

        let hash = hash_password(&password)?;
        let role = request.role.unwrap_or_default();
        let user = self
            .repository
            .users
            .create(&username, &email, &hash, role)
            .await?;

        tracing::info!("Registered user id={} role={}", user.id, user.role);
        Ok(user)
    }

    /// Check credentials and issue an access/refresh token pair
    pub async fn login(&self, request: LoginRequest) -> AppResult<(User, TokenPair)> {
        validate_request(&request)?;

        let email = request.email.unwrap_or_default();
        let password = request.password.unwrap_or_default();

        let Some(user) = self.repository.users.get_by_email(&email).await? else {
            tracing::warn!("Login failed: unknown email");
            return Err(AppError::InvalidCredentials);
        };

        if !verify_password(&user.password, &password)? {
            tracing::warn!("Login failed: wrong password for user id={}", user.id);
            return Err(AppError::InvalidCredentials);
        }

        if !user.is_active {
            tracing::warn!("Login refused: user id={} is deactivated", user.id);
            return Err(AppError::AccountDeactivated);
        }

        let tokens = TokenPair {
            access_token: self.issue_token(&user, TokenType::Access)?,
            refresh_token: self.issue_token(&user, TokenType::Refresh)?,
        };

        Ok((user, tokens))
    }

    /// Exchange a refresh token for a new access token
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<String> {
        let claims = self.decode(refresh_token, TokenType::Refresh)?;

        let user = self
            .repository
            .users
            .find_by_id(claims.user_id)
            .await?
            .ok_or_else(|| AppError::Authentication("User no longer exists".to_string()))?;

        if !user.is_active {
            return Err(AppError::AccountDeactivated);
        }

        // role is read again so a changed role takes effect on refresh
        self.issue_token(&user, TokenType::Access)
    }

    /// Validate a bearer access token and return the caller's identity
    pub fn authorize(&self, token: &str) -> AppResult<UserClaims> {
        self.decode(token, TokenType::Access)
    }

    fn decode(&self, token: &str, expected: TokenType) -> AppResult<UserClaims> {
        let claims = UserClaims::from_token(token, &self.config.jwt_secret)
            .map_err(|_| AppError::Authentication("Token is invalid or expired".to_string()))?;

        if claims.token_type != expected {
            return Err(AppError::Authentication("Token has wrong type".to_string()));
        }

        Ok(claims)
    }

    fn issue_token(&self, user: &User, token_type: TokenType) -> AppResult<String> {
        let lifetime = match token_type {
            TokenType::Access => self.config.access_token_minutes * 60,
            TokenType::Refresh => self.config.refresh_token_days * 24 * 3600,
        };

        UserClaims::new(user, token_type, Utc::now().timestamp(), lifetime)
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored Argon2 hash
pub fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
