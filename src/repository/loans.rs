//! Loans repository for database operations
//!
//! Borrow and return each run in a single transaction. Row locks are taken in
//! the order user, book, loan (the same order user deletion uses), so
//! concurrent requests on one book serialize instead of racing on
//! `available_copies`.

use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, Pool, Postgres, Row};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::Book,
        loan::{Loan, LoanDetails},
        user::{User, UserRow, UserShort},
    },
};

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Lend one copy of `book_id` to `user_id`
    pub async fn borrow(
        &self,
        user_id: i32,
        book_id: i32,
        due_date: Option<DateTime<Utc>>,
    ) -> AppResult<LoanDetails> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let user: User = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1 FOR SHARE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::Authentication("User no longer exists".to_string()))?
            .into();

        if !user.is_active {
            return Err(AppError::AccountDeactivated);
        }

        let mut book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(book_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

        book.borrow()?;

        let already_borrowed: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM loans WHERE user_id = $1 AND book_id = $2 AND return_date IS NULL)",
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_one(&mut *tx)
        .await?;

        if already_borrowed {
            return Err(AppError::Validation(
                "You have already borrowed this book".to_string(),
            ));
        }

        let loan = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (user_id, book_id, borrow_date, return_date, due_date)
            VALUES ($1, $2, $3, NULL, $4)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(now)
        .bind(due_date)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE books SET available_copies = $1 WHERE id = $2")
            .bind(book.available_copies)
            .bind(book_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(LoanDetails::new(&loan, UserShort::from(&user), book, now))
    }

    /// Close the active loan of `user_id` on `book_id`
    pub async fn return_book(&self, user_id: i32, book_id: i32) -> AppResult<LoanDetails> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let user: User = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1 FOR SHARE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::Authentication("User no longer exists".to_string()))?
            .into();

        let not_found = || AppError::NotFound("No active borrowing record found".to_string());

        let mut book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(book_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(not_found)?;

        let mut loan = sqlx::query_as::<_, Loan>(
            r#"
            SELECT * FROM loans
            WHERE user_id = $1 AND book_id = $2 AND return_date IS NULL
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(not_found)?;

        loan.mark_returned(now)?;
        book.return_book()?;

        sqlx::query("UPDATE loans SET return_date = $1 WHERE id = $2")
            .bind(loan.return_date)
            .bind(loan.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE books SET available_copies = $1 WHERE id = $2")
            .bind(book.available_copies)
            .bind(book_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(LoanDetails::new(&loan, UserShort::from(&user), book, now))
    }

    /// Active loans, of one user or system-wide
    pub async fn get_active_loans(&self, user_id: Option<i32>) -> AppResult<Vec<LoanDetails>> {
        let rows = sqlx::query(
            r#"
            SELECT l.id, l.user_id, l.book_id, l.borrow_date, l.return_date, l.due_date,
                   u.username, u.email, u.role,
                   b.title, b.author, b.genre, b.isbn, b.published_date,
                   b.total_copies, b.available_copies
            FROM loans l
            JOIN users u ON l.user_id = u.id
            JOIN books b ON l.book_id = b.id
            WHERE l.return_date IS NULL AND ($1::int IS NULL OR l.user_id = $1)
            ORDER BY l.borrow_date, l.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let now = Utc::now();
        Ok(rows.iter().map(|row| loan_details_from_row(row, now)).collect())
    }
}

fn loan_details_from_row(row: &PgRow, now: DateTime<Utc>) -> LoanDetails {
    let loan = Loan {
        id: row.get("id"),
        user_id: row.get("user_id"),
        book_id: row.get("book_id"),
        borrow_date: row.get("borrow_date"),
        return_date: row.get("return_date"),
        due_date: row.get("due_date"),
    };

    let role: String = row.get("role");
    let user = UserShort {
        id: loan.user_id,
        username: row.get("username"),
        email: row.get("email"),
        role: role.parse().unwrap_or_default(),
    };

    let book = Book {
        id: loan.book_id,
        title: row.get("title"),
        author: row.get("author"),
        genre: row.get("genre"),
        isbn: row.get("isbn"),
        published_date: row.get("published_date"),
        total_copies: row.get("total_copies"),
        available_copies: row.get("available_copies"),
    };

    LoanDetails::new(&loan, user, book, now)
}
