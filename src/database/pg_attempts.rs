use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::Result;
use crate::models::attempt::{AttemptQuestion, ExamAttempt, LockedQuestion, NewAttempt};
use crate::services::stores::AttemptStore;

pub struct PgAttemptStore {
    pool: PgPool,
}

impl PgAttemptStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttemptStore for PgAttemptStore {
    async fn create_attempt(
        &self,
        new: NewAttempt,
        locked: &[LockedQuestion],
    ) -> Result<ExamAttempt> {
        let mut tx = self.pool.begin().await?;

        let attempt = sqlx::query_as::<_, ExamAttempt>(
            r#"
            INSERT INTO exam_attempts
                (user_id, mode, exam_name, question_count, time_limit_seconds, started_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(new.user_id)
        .bind(new.mode)
        .bind(&new.exam_name)
        .bind(new.question_count)
        .bind(new.time_limit_seconds)
        .bind(new.started_at)
        .fetch_one(&mut *tx)
        .await?;

        for entry in locked {
            sqlx::query(
                r#"
                INSERT INTO exam_attempt_questions
                    (attempt_id, question_id, position, topic, subtopic)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(attempt.id)
            .bind(entry.question_id)
            .bind(entry.position)
            .bind(&entry.topic)
            .bind(&entry.subtopic)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(attempt)
    }

    async fn attempt(&self, attempt_id: i64) -> Result<Option<ExamAttempt>> {
        let attempt = sqlx::query_as::<_, ExamAttempt>(
            r#"SELECT * FROM exam_attempts WHERE id = $1"#,
        )
        .bind(attempt_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(attempt)
    }

    async fn attempts_for_user(&self, user_id: i64, limit: i64) -> Result<Vec<ExamAttempt>> {
        let attempts = sqlx::query_as::<_, ExamAttempt>(
            r#"SELECT * FROM exam_attempts WHERE user_id = $1 ORDER BY id DESC LIMIT $2"#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(attempts)
    }

    async fn questions_for(&self, attempt_id: i64) -> Result<Vec<AttemptQuestion>> {
        let rows = sqlx::query_as::<_, AttemptQuestion>(
            r#"SELECT * FROM exam_attempt_questions WHERE attempt_id = $1 ORDER BY position ASC"#,
        )
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn question_at(
        &self,
        attempt_id: i64,
        position: i32,
    ) -> Result<Option<AttemptQuestion>> {
        let row = sqlx::query_as::<_, AttemptQuestion>(
            r#"SELECT * FROM exam_attempt_questions WHERE attempt_id = $1 AND position = $2"#,
        )
        .bind(attempt_id)
        .bind(position)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn is_locked_question(&self, attempt_id: i64, question_id: i64) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM exam_attempt_questions
                WHERE attempt_id = $1 AND question_id = $2
            )
            "#,
        )
        .bind(attempt_id)
        .bind(question_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn upsert_answer(
        &self,
        attempt_id: i64,
        question_id: i64,
        selected_label: &str,
        answered_at: DateTime<Utc>,
    ) -> Result<bool> {
        // Guarded in one statement so a late answer and a concurrent submit
        // cannot both succeed.
        let result = sqlx::query(
            r#"
            INSERT INTO exam_answers (attempt_id, question_id, selected_label, answered_at)
            SELECT $1, $2, $3, $4
            WHERE EXISTS (
                SELECT 1 FROM exam_attempts WHERE id = $1 AND submitted_at IS NULL
            )
            ON CONFLICT (attempt_id, question_id)
            DO UPDATE SET selected_label = EXCLUDED.selected_label,
                          answered_at = EXCLUDED.answered_at
            "#,
        )
        .bind(attempt_id)
        .bind(question_id)
        .bind(selected_label)
        .bind(answered_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn answers_for(&self, attempt_id: i64) -> Result<HashMap<i64, String>> {
        let rows = sqlx::query_as::<_, (i64, String)>(
            r#"
            SELECT question_id, selected_label
            FROM exam_answers
            WHERE attempt_id = $1 AND selected_label IS NOT NULL
            "#,
        )
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    async fn answer_for(&self, attempt_id: i64, question_id: i64) -> Result<Option<String>> {
        let label = sqlx::query_scalar::<_, Option<String>>(
            r#"SELECT selected_label FROM exam_answers WHERE attempt_id = $1 AND question_id = $2"#,
        )
        .bind(attempt_id)
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(label.flatten())
    }

    async fn finalize(
        &self,
        attempt_id: i64,
        submitted_at: DateTime<Utc>,
        score_percent: i32,
        passed: bool,
    ) -> Result<bool> {
        // Compare-and-set: only an unsubmitted attempt can be frozen, so a
        // concurrent submit race has exactly one winner.
        let result = sqlx::query(
            r#"
            UPDATE exam_attempts
            SET submitted_at = $2, score_percent = $3, passed = $4
            WHERE id = $1 AND submitted_at IS NULL
            "#,
        )
        .bind(attempt_id)
        .bind(submitted_at)
        .bind(score_percent)
        .bind(passed)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
