//! User management service

use crate::{
    error::{AppError, AppResult},
    models::user::{Role, UpdateProfile, UpdateUser, User, UserClaims},
    repository::Repository,
};

use super::{
    auth::{hash_password, verify_password},
    confirm_admin, validate_request,
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
}

impl UsersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// The caller's own account
    pub async fn get_profile(&self, actor: &UserClaims) -> AppResult<User> {
        let user = self
            .repository
            .users
            .find_by_id(actor.user_id)
            .await?
            .ok_or_else(|| AppError::Authentication("User no longer exists".to_string()))?;

        if !user.is_active {
            return Err(AppError::AccountDeactivated);
        }
        Ok(user)
    }

    /// Update the caller's own username, email or password
    pub async fn update_profile(&self, actor: &UserClaims, profile: UpdateProfile) -> AppResult<User> {
        validate_request(&profile)?;

        let user = self.get_profile(actor).await?;
        if profile.is_empty() {
            return Ok(user);
        }

        if let Some(ref email) = profile.email {
            if self.repository.users.email_exists(email, Some(user.id)).await? {
                return Err(AppError::Validation(
                    "A user with this email already exists".to_string(),
                ));
            }
        }

        // If changing password, verify current password
        let password = match profile.new_password {
            Some(ref new_password) => {
                let current = profile.current_password.as_ref().ok_or_else(|| {
                    AppError::Validation("Current password required to change password".to_string())
                })?;
                if !verify_password(&user.password, current)? {
                    return Err(AppError::Validation("Current password is incorrect".to_string()));
                }
                Some(hash_password(new_password)?)
            }
            None => None,
        };

        self.repository
            .users
            .update_profile(user.id, &profile, password)
            .await
    }

    /// List every account (admin only)
    pub async fn list_users(&self, actor: &UserClaims) -> AppResult<Vec<User>> {
        confirm_admin(&self.repository, actor).await?;
        self.repository.users.list().await
    }

    /// Change another account's role or active flag (admin only)
    pub async fn update_user(&self, actor: &UserClaims, user_id: i32, update: UpdateUser) -> AppResult<User> {
        actor.require_admin()?;

        if user_id == actor.user_id
            && (update.is_active == Some(false) || update.role == Some(Role::User))
        {
            return Err(AppError::Validation(
                "You cannot demote or deactivate your own account".to_string(),
            ));
        }
        confirm_admin(&self.repository, actor).await?;

        let user = self.repository.users.update_account(user_id, &update).await?;
        tracing::info!(
            "User id={} updated by admin id={}: role={} active={}",
            user.id,
            actor.user_id,
            user.role,
            user.is_active
        );
        Ok(user)
    }

    /// Delete an account and its loan history (admin only)
    pub async fn delete_user(&self, actor: &UserClaims, user_id: i32) -> AppResult<()> {
        confirm_admin(&self.repository, actor).await?;
        self.repository.users.delete(user_id).await
    }
}
