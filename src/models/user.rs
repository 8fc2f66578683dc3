//! User model, roles and JWT claims

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::AppError;

/// Authorization tier of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::User => "User",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(Role::Admin),
            "User" => Ok(Role::User),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Internal row structure for database queries (role stored as text)
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    id: i32,
    email: String,
    username: String,
    password: String,
    role: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            username: row.username,
            password: row.password,
            // the column carries a CHECK constraint, anything else is unreachable
            role: row.role.parse().unwrap_or(Role::User),
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Full user model from database
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub username: String,
    /// Hashed password (argon2)
    #[serde(skip_serializing)]
    pub password: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Short user representation embedded in loans
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserShort {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl From<&User> for UserShort {
    fn from(user: &User) -> Self {
        UserShort {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Registration request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterUser {
    #[validate(
        required(message = "Username is required"),
        length(min = 1, max = 150, message = "Username must be 1 to 150 characters")
    )]
    pub username: Option<String>,
    #[validate(
        required(message = "Email is required"),
        email(message = "Enter a valid email address")
    )]
    pub email: Option<String>,
    #[validate(
        required(message = "Password is required"),
        length(min = 8, message = "Ensure this field has at least 8 characters")
    )]
    pub password: Option<String>,
    /// Defaults to `User`
    pub role: Option<Role>,
}

/// Login request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(
        required(message = "Email is required"),
        email(message = "Enter a valid email address")
    )]
    pub email: Option<String>,
    #[validate(required(message = "Password is required"))]
    pub password: Option<String>,
}

/// Update own profile request (for authenticated users)
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProfile {
    /// Display name
    #[validate(length(min = 1, max = 150, message = "Username must be 1 to 150 characters"))]
    pub username: Option<String>,
    /// Email address (must be unique)
    #[validate(email(message = "Enter a valid email address"))]
    pub email: Option<String>,
    /// Current password (required to change password)
    pub current_password: Option<String>,
    /// New password
    #[validate(length(min = 8, message = "Ensure this field has at least 8 characters"))]
    pub new_password: Option<String>,
}

impl UpdateProfile {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.new_password.is_none()
    }
}

/// Admin update of another account
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateUser {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

/// Kind of JWT, so refresh tokens cannot be used as bearer tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    /// User id as a string (JWT convention)
    pub sub: String,
    pub user_id: i32,
    pub role: Role,
    pub token_type: TokenType,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    pub fn new(user: &User, token_type: TokenType, issued_at: i64, lifetime_secs: i64) -> Self {
        Self {
            sub: user.id.to_string(),
            user_id: user.id,
            role: user.role,
            token_type,
            exp: issued_at + lifetime_secs,
            iat: issued_at,
        }
    }

    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token (signature and expiry are checked)
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    /// Check if user is admin
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Require admin privileges
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "You do not have permission to perform this action".to_string(),
            ))
        }
    }
}
