use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::attempt::{AttemptQuestion, ExamAttempt, LockedQuestion, NewAttempt};
use crate::models::user::User;

/// Persistence for attempts, their locked question sets, and answers.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Persists the attempt row and its locked questions in one transaction;
    /// a failure leaves nothing behind.
    async fn create_attempt(
        &self,
        new: NewAttempt,
        locked: &[LockedQuestion],
    ) -> Result<ExamAttempt>;

    async fn attempt(&self, attempt_id: i64) -> Result<Option<ExamAttempt>>;

    async fn attempts_for_user(&self, user_id: i64, limit: i64) -> Result<Vec<ExamAttempt>>;

    /// The locked set in position order.
    async fn questions_for(&self, attempt_id: i64) -> Result<Vec<AttemptQuestion>>;

    async fn question_at(
        &self,
        attempt_id: i64,
        position: i32,
    ) -> Result<Option<AttemptQuestion>>;

    async fn is_locked_question(&self, attempt_id: i64, question_id: i64) -> Result<bool>;

    /// Inserts or overwrites the single answer row for (attempt, question),
    /// guarded on the attempt still being unsubmitted. Returns false when a
    /// concurrent submit got there first.
    async fn upsert_answer(
        &self,
        attempt_id: i64,
        question_id: i64,
        selected_label: &str,
        answered_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Selected label per question id for the attempt.
    async fn answers_for(&self, attempt_id: i64) -> Result<HashMap<i64, String>>;

    async fn answer_for(&self, attempt_id: i64, question_id: i64) -> Result<Option<String>>;

    /// Freezes submitted_at/score_percent/passed in one compare-and-set
    /// update guarded on the attempt still being unsubmitted. Returns false
    /// when a concurrent submit won the race.
    async fn finalize(
        &self,
        attempt_id: i64,
        submitted_at: DateTime<Utc>,
        score_percent: i32,
        passed: bool,
    ) -> Result<bool>;
}

/// Account persistence for the auth endpoints.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Creates an account; a duplicate email fails with Conflict.
    async fn create(&self, email: &str, password_hash: &str) -> Result<User>;

    async fn by_email(&self, email: &str) -> Result<Option<User>>;

    async fn by_id(&self, id: i64) -> Result<Option<User>>;
}
