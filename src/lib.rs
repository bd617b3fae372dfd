//! Piggy Backend Library
//!
//! This module exposes the backend components for use by tests and other consumers.

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod gcp;
pub mod http;
pub mod ledger;
pub mod models;
pub mod notifications;
pub mod repositories;
pub mod services;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use auth::AuthMode;
use database::Database;
use gcp::Uploader;
use notifications::Notifier;
use repositories::*;
use services::{DonationService, PiggyLedger, PiggyService, UserService};
use std::sync::Arc;

/// Shared state handed to every request handler
#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub auth: AuthMode,
    pub users: Arc<UserService>,
    pub piggies: Arc<PiggyService>,
    pub donations: Arc<DonationService>,
    pub ledger: Arc<dyn PiggyLedger>,
    pub uploader: Arc<Uploader>,
}

impl AppState {
    /// Create a new AppState with repositories and services over `pool`
    pub fn new(
        pool: sqlx::PgPool,
        auth: AuthMode,
        ledger: Arc<dyn PiggyLedger>,
        uploader: Arc<Uploader>,
        notifier: Arc<Notifier>,
    ) -> Self {
        let user_repo = Arc::new(UserRepository::new(pool.clone()));
        let piggy_repo = Arc::new(PiggyRepository::new(pool.clone()));
        let donation_repo = Arc::new(DonationRepository::new(pool.clone()));

        Self {
            database: Database::new(pool),
            auth,
            users: Arc::new(UserService::new(
                user_repo.clone(),
                ledger.clone(),
                notifier,
            )),
            piggies: Arc::new(PiggyService::new(
                piggy_repo.clone(),
                donation_repo.clone(),
                user_repo.clone(),
                ledger.clone(),
                uploader.clone(),
            )),
            donations: Arc::new(DonationService::new(
                donation_repo,
                piggy_repo,
                user_repo,
                ledger.clone(),
            )),
            ledger,
            uploader,
        }
    }
}
