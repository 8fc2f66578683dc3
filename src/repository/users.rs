//! Users repository for database operations

use chrono::Utc;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::user::{Role, UpdateProfile, UpdateUser, User, UserRow},
};

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get user by ID, `None` if absent
    pub async fn find_by_id(&self, id: i32) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(User::from))
    }

    /// Get user by email (authentication lookup, case-insensitive)
    pub async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT * FROM users WHERE LOWER(email) = LOWER($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    /// Check if email already exists
    pub async fn email_exists(&self, email: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM users
                WHERE LOWER(email) = LOWER($1) AND ($2::int IS NULL OR id != $2)
            )
            "#,
        )
        .bind(email)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// List all users
    pub async fn list(&self) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>("SELECT * FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    /// Create a new user
    pub async fn create(
        &self,
        username: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> AppResult<User> {
        let now = Utc::now();

        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (username, email, password, role, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, TRUE, $5, $5)
            RETURNING *
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(password)
        .bind(role.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    /// Update own profile (only supplied fields change)
    pub async fn update_profile(
        &self,
        id: i32,
        profile: &UpdateProfile,
        password: Option<String>,
    ) -> AppResult<User> {
        let now = Utc::now();

        let mut sets = vec!["updated_at = $1".to_string()];
        let mut param_idx = 2;

        macro_rules! add_field {
            ($field:expr, $name:expr) => {
                if $field.is_some() {
                    sets.push(format!("{} = ${}", $name, param_idx));
                    param_idx += 1;
                }
            };
        }

        add_field!(profile.username, "username");
        add_field!(profile.email, "email");
        add_field!(password, "password");

        let query = format!(
            "UPDATE users SET {} WHERE id = ${} RETURNING *",
            sets.join(", "),
            param_idx
        );

        let mut builder = sqlx::query_as::<_, UserRow>(&query).bind(now);

        macro_rules! bind_field {
            ($field:expr) => {
                if let Some(ref val) = $field {
                    builder = builder.bind(val);
                }
            };
        }

        bind_field!(profile.username);
        bind_field!(profile.email);
        bind_field!(password);

        let row = builder
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        Ok(row.into())
    }

    /// Update role and/or active flag (admin)
    pub async fn update_account(&self, id: i32, update: &UpdateUser) -> AppResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users SET
                role = COALESCE($1, role),
                is_active = COALESCE($2, is_active),
                updated_at = $3
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(update.role.map(|r| r.as_str()))
        .bind(update.is_active)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        Ok(row.into())
    }

    /// Delete a user together with their loans.
    ///
    /// Copies still held by the user go back on the shelf before the loans
    /// are removed, all in one transaction.
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<i32> =
            sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        if locked.is_none() {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        let restored = sqlx::query(
            r#"
            UPDATE books b
            SET available_copies = b.available_copies + held.count
            FROM (
                SELECT book_id, COUNT(*)::int AS count
                FROM loans
                WHERE user_id = $1 AND return_date IS NULL
                GROUP BY book_id
            ) held
            WHERE b.id = held.book_id
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let loans = sqlx::query("DELETE FROM loans WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            "Deleted user id={} ({} loans removed, copies restored on {} books)",
            id,
            loans,
            restored
        );
        Ok(())
    }
}
