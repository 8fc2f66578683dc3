//! Catalog management service

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, CreateBook, UpdateBook},
        user::UserClaims,
    },
    repository::Repository,
};

use super::{confirm_admin, validate_request};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// All books, open to anyone
    pub async fn list_books(&self) -> AppResult<Vec<Book>> {
        self.repository.books.list().await
    }

    /// Add a book; every copy starts on the shelf
    pub async fn add_book(&self, actor: &UserClaims, data: CreateBook) -> AppResult<Book> {
        actor.require_admin()?;
        validate_request(&data)?;

        let book = Book::new_from(&data)?;
        confirm_admin(&self.repository, actor).await?;
        self.ensure_isbn_free(&book.isbn, None).await?;

        let created = self.repository.books.create(&book).await?;
        tracing::info!("Book id={} added by admin id={}", created.id, actor.user_id);
        Ok(created)
    }

    /// Partially update a book
    pub async fn update_book(&self, actor: &UserClaims, book_id: i32, update: UpdateBook) -> AppResult<Book> {
        actor.require_admin()?;
        validate_request(&update)?;
        confirm_admin(&self.repository, actor).await?;

        self.repository.books.get_by_id(book_id).await?;
        if let Some(ref isbn) = update.isbn {
            self.ensure_isbn_free(isbn, Some(book_id)).await?;
        }

        self.repository.books.update(book_id, &update).await
    }

    /// Delete a book and its loan history
    pub async fn delete_book(&self, actor: &UserClaims, book_id: i32) -> AppResult<()> {
        confirm_admin(&self.repository, actor).await?;
        self.repository.books.delete(book_id).await
    }

    async fn ensure_isbn_free(&self, isbn: &str, exclude_id: Option<i32>) -> AppResult<()> {
        if self.repository.books.isbn_exists(isbn, exclude_id).await? {
            return Err(AppError::Validation(
                "A book with this ISBN already exists".to_string(),
            ));
        }
        Ok(())
    }
}
