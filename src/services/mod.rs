//! Business logic services
//!
//! Every operation that acts on behalf of somebody takes the caller's
//! `UserClaims` as an explicit `actor` argument.

pub mod auth;
pub mod catalog;
pub mod loans;
pub mod users;

use validator::{Validate, ValidationErrors};

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
    models::user::{Role, UserClaims},
    repository::Repository,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub users: users::UsersService,
    pub catalog: catalog::CatalogService,
    pub loans: loans::LoansService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> Self {
        Self {
            auth: auth::AuthService::new(repository.clone(), config.auth.clone()),
            users: users::UsersService::new(repository.clone()),
            catalog: catalog::CatalogService::new(repository.clone()),
            loans: loans::LoansService::new(repository, config.loans.clone()),
        }
    }
}

/// Check the stored account behind an admin token.
///
/// Tokens keep their role until they expire, so admin operations re-read the
/// account and refuse it once it has been demoted, deactivated or deleted.
pub async fn confirm_admin(repository: &Repository, actor: &UserClaims) -> AppResult<()> {
    actor.require_admin()?;

    let user = repository
        .users
        .find_by_id(actor.user_id)
        .await?
        .ok_or_else(|| AppError::Authentication("User no longer exists".to_string()))?;

    if !user.is_active {
        return Err(AppError::AccountDeactivated);
    }
    if user.role != Role::Admin {
        tracing::warn!("Admin token of demoted user id={} refused", user.id);
        return Err(AppError::Authorization(
            "You do not have permission to perform this action".to_string(),
        ));
    }
    Ok(())
}

/// Validate a request, reporting only the first failing field (by field name)
pub fn validate_request<T: Validate>(request: &T) -> AppResult<()> {
    request
        .validate()
        .map_err(|errors| AppError::Validation(first_error_message(&errors)))
}

fn first_error_message(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    fields
        .into_iter()
        .find_map(|(field, errs)| {
            errs.first().map(|e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for {}", field))
            })
        })
        .unwrap_or_else(|| "An error occurred".to_string())
}
