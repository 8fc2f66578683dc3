//! Loan (borrowing history) model and lifecycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::book::Book;
use super::user::UserShort;
use crate::error::{AppError, AppResult};

/// Lifecycle of a loan: `Active` until the copy comes back, then `Returned` for good
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Returned,
}

/// Loan model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Loan {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub borrow_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
}

impl Loan {
    pub fn status(&self) -> LoanStatus {
        if self.return_date.is_some() {
            LoanStatus::Returned
        } else {
            LoanStatus::Active
        }
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status() == LoanStatus::Active && self.due_date.map(|d| d < now).unwrap_or(false)
    }

    /// Close the loan. The return date never precedes the borrow date.
    pub fn mark_returned(&mut self, now: DateTime<Utc>) -> AppResult<()> {
        if self.status() == LoanStatus::Returned {
            return Err(AppError::Validation("Loan already returned".to_string()));
        }
        self.return_date = Some(now.max(self.borrow_date));
        Ok(())
    }
}

/// Loan with embedded user and book for display
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanDetails {
    pub id: i32,
    pub user: UserShort,
    pub book: Book,
    pub borrow_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub overdue: bool,
    pub status: LoanStatus,
}

impl LoanDetails {
    pub fn new(loan: &Loan, user: UserShort, book: Book, now: DateTime<Utc>) -> Self {
        Self {
            id: loan.id,
            user,
            book,
            borrow_date: loan.borrow_date,
            return_date: loan.return_date,
            due_date: loan.due_date,
            overdue: loan.is_overdue(now),
            status: loan.status(),
        }
    }
}
