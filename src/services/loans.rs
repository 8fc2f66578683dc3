//! Loan management service

use chrono::{DateTime, Duration, Utc};

use crate::{
    config::LoansConfig,
    error::AppResult,
    models::{loan::LoanDetails, user::UserClaims},
    repository::Repository,
};

use super::confirm_admin;

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    config: LoansConfig,
}

impl LoansService {
    pub fn new(repository: Repository, config: LoansConfig) -> Self {
        Self { repository, config }
    }

    /// Borrow one copy of a book for the caller
    pub async fn borrow(&self, actor: &UserClaims, book_id: i32) -> AppResult<LoanDetails> {
        let due_date = self.due_date_from(Utc::now());
        let loan = self
            .repository
            .loans
            .borrow(actor.user_id, book_id, due_date)
            .await?;

        tracing::info!(
            "Loan id={}: user id={} borrowed book id={} ({} left)",
            loan.id,
            actor.user_id,
            book_id,
            loan.book.available_copies
        );
        Ok(loan)
    }

    /// Return the caller's active loan on a book
    pub async fn return_book(&self, actor: &UserClaims, book_id: i32) -> AppResult<LoanDetails> {
        let loan = self
            .repository
            .loans
            .return_book(actor.user_id, book_id)
            .await?;

        tracing::info!(
            "Loan id={}: user id={} returned book id={}",
            loan.id,
            actor.user_id,
            book_id
        );
        Ok(loan)
    }

    /// The caller's active loans
    pub async fn my_active_loans(&self, actor: &UserClaims) -> AppResult<Vec<LoanDetails>> {
        self.repository.loans.get_active_loans(Some(actor.user_id)).await
    }

    /// Every active loan (admin only)
    pub async fn all_active_loans(&self, actor: &UserClaims) -> AppResult<Vec<LoanDetails>> {
        confirm_admin(&self.repository, actor).await?;
        self.repository.loans.get_active_loans(None).await
    }

    fn due_date_from(&self, borrowed: DateTime<Utc>) -> Option<DateTime<Utc>> {
        (self.config.duration_days > 0).then(|| borrowed + Duration::days(self.config.duration_days))
    }
}
