//! Book model and copy accounting
//!
//! `available_copies` is the number of copies on the shelf; the difference to
//! `total_copies` is the number of outstanding loans. Every mutation goes
//! through the methods below so `0 <= available_copies <= total_copies` holds
//! before and after each of them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Book model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub isbn: String,
    pub published_date: NaiveDate,
    pub total_copies: i32,
    pub available_copies: i32,
}

impl Book {
    /// Build a book that is not stored yet, with every copy on the shelf
    pub fn new_from(data: &CreateBook) -> AppResult<Self> {
        let (Some(title), Some(author), Some(genre), Some(isbn), Some(published_date), Some(total)) = (
            data.title.clone(),
            data.author.clone(),
            data.genre.clone(),
            data.isbn.clone(),
            data.published_date,
            data.total_copies,
        ) else {
            return Err(AppError::Validation("This field is required".to_string()));
        };

        if total < 0 {
            return Err(AppError::Validation(
                "Total copies must not be negative".to_string(),
            ));
        }

        Ok(Self {
            id: 0,
            title,
            author,
            genre,
            isbn,
            published_date,
            total_copies: total,
            available_copies: total,
        })
    }

    /// Take one copy off the shelf
    pub fn borrow(&mut self) -> AppResult<()> {
        if self.available_copies <= 0 {
            return Err(AppError::NoCopiesAvailable);
        }
        self.available_copies -= 1;
        Ok(())
    }

    /// Put one copy back on the shelf
    pub fn return_book(&mut self) -> AppResult<()> {
        if self.available_copies >= self.total_copies {
            return Err(AppError::AllCopiesAlreadyReturned);
        }
        self.available_copies += 1;
        Ok(())
    }

    /// Apply a partial update.
    ///
    /// `active_loans` is the number of loans currently open on this book.
    /// `available_copies` is recomputed as `total_copies - active_loans`, so
    /// an explicit `available_copies` is only accepted when it matches that
    /// value. Nothing is applied when the update is rejected.
    pub fn apply_update(&mut self, update: &UpdateBook, active_loans: i32) -> AppResult<()> {
        let total = update.total_copies.unwrap_or(self.total_copies);

        if total < 0 {
            return Err(AppError::Validation(
                "Total copies must not be negative".to_string(),
            ));
        }
        if total < active_loans {
            return Err(AppError::Validation(format!(
                "Total copies cannot be lower than the {} copies currently borrowed",
                active_loans
            )));
        }

        let available = total - active_loans;
        if let Some(requested) = update.available_copies {
            if requested != available {
                return Err(AppError::Validation(format!(
                    "Available copies must be {} ({} total, {} borrowed)",
                    available, total, active_loans
                )));
            }
        }

        if let Some(ref title) = update.title {
            self.title = title.clone();
        }
        if let Some(ref author) = update.author {
            self.author = author.clone();
        }
        if let Some(ref genre) = update.genre {
            self.genre = genre.clone();
        }
        if let Some(ref isbn) = update.isbn {
            self.isbn = isbn.clone();
        }
        if let Some(published_date) = update.published_date {
            self.published_date = published_date;
        }
        self.total_copies = total;
        self.available_copies = available;

        Ok(())
    }
}

/// Create book request (available copies always start at `total_copies`)
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(
        required(message = "Title is required"),
        length(min = 1, max = 255, message = "Title must be 1 to 255 characters")
    )]
    pub title: Option<String>,
    #[validate(
        required(message = "Author is required"),
        length(min = 1, max = 255, message = "Author must be 1 to 255 characters")
    )]
    pub author: Option<String>,
    #[validate(
        required(message = "Genre is required"),
        length(min = 1, max = 100, message = "Genre must be 1 to 100 characters")
    )]
    pub genre: Option<String>,
    #[validate(
        required(message = "ISBN is required"),
        length(min = 1, max = 13, message = "ISBN must be 1 to 13 characters")
    )]
    pub isbn: Option<String>,
    #[validate(required(message = "Published date is required"))]
    pub published_date: Option<NaiveDate>,
    #[validate(
        required(message = "Total copies is required"),
        range(min = 0, message = "Total copies must not be negative")
    )]
    pub total_copies: Option<i32>,
}

/// Partial book update request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Author must be 1 to 255 characters"))]
    pub author: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Genre must be 1 to 100 characters"))]
    pub genre: Option<String>,
    #[validate(length(min = 1, max = 13, message = "ISBN must be 1 to 13 characters"))]
    pub isbn: Option<String>,
    pub published_date: Option<NaiveDate>,
    #[validate(range(min = 0, message = "Total copies must not be negative"))]
    pub total_copies: Option<i32>,
    #[validate(range(min = 0, message = "Available copies must not be negative"))]
    pub available_copies: Option<i32>,
}
