pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use sqlx::PgPool;

use crate::database::{pg_attempts::PgAttemptStore, pg_bank::PgQuestionBank, pg_users::PgUserStore};
use crate::services::exam_flow::ExamFlow;
use crate::services::question_bank::QuestionBank;
use crate::services::stores::{AttemptStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub exam_flow: ExamFlow,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let bank: Arc<dyn QuestionBank> = Arc::new(PgQuestionBank::new(pool.clone()));
        let attempts: Arc<dyn AttemptStore> = Arc::new(PgAttemptStore::new(pool.clone()));
        let users: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool));
        Self::with_stores(users, bank, attempts)
    }

    /// Wires the state from explicit store implementations; tests use this
    /// with in-memory stores.
    pub fn with_stores(
        users: Arc<dyn UserStore>,
        bank: Arc<dyn QuestionBank>,
        attempts: Arc<dyn AttemptStore>,
    ) -> Self {
        Self {
            users,
            exam_flow: ExamFlow::new(bank, attempts),
        }
    }
}
