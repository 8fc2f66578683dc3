//! Libris library lending server
//!
//! REST JSON API for a small lending library: user accounts with
//! JWT authentication, a book catalog with copy tracking, and loans.

use std::sync::Arc;

use sqlx::PgPool;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use api::router;
pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
    pub pool: PgPool,
}

impl AppState {
    /// Build services on top of a connection pool
    pub fn new(config: AppConfig, pool: PgPool) -> Self {
        let repository = repository::Repository::new(pool.clone());
        let services = services::Services::new(repository, &config);

        Self {
            config: Arc::new(config),
            services: Arc::new(services),
            pool,
        }
    }
}
