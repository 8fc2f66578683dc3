//! Books repository for database operations

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, UpdateBook},
};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// List every book
    pub async fn list(&self) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>("SELECT * FROM books ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(books)
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))
    }

    /// Check if ISBN already exists
    pub async fn isbn_exists(&self, isbn: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1 AND ($2::int IS NULL OR id != $2))",
        )
        .bind(isbn)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Insert a new book
    pub async fn create(&self, book: &Book) -> AppResult<Book> {
        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (
                title, author, genre, isbn, published_date, total_copies, available_copies
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.genre)
        .bind(&book.isbn)
        .bind(book.published_date)
        .bind(book.total_copies)
        .bind(book.available_copies)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    /// Apply a partial update under a row lock, so loans on the same book
    /// cannot move the copy counts in between. The open loans are counted
    /// inside the lock and `available_copies` is derived from them.
    pub async fn update(&self, id: i32, update: &UpdateBook) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let mut book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

        let active_loans: i32 = sqlx::query_scalar(
            "SELECT COUNT(*)::int FROM loans WHERE book_id = $1 AND return_date IS NULL",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        book.apply_update(update, active_loans)?;

        let updated = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                title = $1, author = $2, genre = $3, isbn = $4, published_date = $5,
                total_copies = $6, available_copies = $7
            WHERE id = $8
            RETURNING *
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.genre)
        .bind(&book.isbn)
        .bind(book.published_date)
        .bind(book.total_copies)
        .bind(book.available_copies)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Delete a book together with its loans
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<i32> =
            sqlx::query_scalar("SELECT id FROM books WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        if locked.is_none() {
            return Err(AppError::NotFound("Book not found".to_string()));
        }

        let loans = sqlx::query("DELETE FROM loans WHERE book_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!("Deleted book id={} ({} loans removed)", id, loans);
        Ok(())
    }
}
