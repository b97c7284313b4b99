use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::Result;
use crate::models::question::{Choice, Question, QuestionWithChoices};
use crate::services::question_bank::{BankFilter, QuestionBank};

/// Postgres-backed question bank. Uniform sampling is delegated to the
/// database via `ORDER BY random()`.
pub struct PgQuestionBank {
    pool: PgPool,
}

impl PgQuestionBank {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuestionBank for PgQuestionBank {
    async fn topic_counts(&self, filter: &BankFilter) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT topic, COUNT(*)
            FROM questions
            WHERE topic IS NOT NULL
              AND ($1::text IS NULL OR exam_name = $1)
              AND ($2::text[] IS NULL OR topic = ANY($2))
            GROUP BY topic
            "#,
        )
        .bind(filter.exam_name.as_deref())
        .bind(filter.topics.as_deref())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn subtopic_counts(
        &self,
        filter: &BankFilter,
    ) -> Result<Vec<(String, Option<String>, i64)>> {
        let rows = sqlx::query_as::<_, (String, Option<String>, i64)>(
            r#"
            SELECT topic, subtopic, COUNT(*)
            FROM questions
            WHERE topic IS NOT NULL
              AND ($1::text IS NULL OR exam_name = $1)
              AND ($2::text[] IS NULL OR topic = ANY($2))
            GROUP BY topic, subtopic
            "#,
        )
        .bind(filter.exam_name.as_deref())
        .bind(filter.topics.as_deref())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn sample_bucket<'a>(
        &self,
        filter: &BankFilter,
        topic: &str,
        subtopic: Option<&'a str>,
        limit: i64,
    ) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id
            FROM questions
            WHERE topic = $1
              AND subtopic IS NOT DISTINCT FROM $2
              AND ($3::text IS NULL OR exam_name = $3)
              AND ($4::text[] IS NULL OR topic = ANY($4))
            ORDER BY random()
            LIMIT $5
            "#,
        )
        .bind(topic)
        .bind(subtopic)
        .bind(filter.exam_name.as_deref())
        .bind(filter.topics.as_deref())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn sample_filler(
        &self,
        filter: &BankFilter,
        exclude: &[i64],
        limit: i64,
    ) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id
            FROM questions
            WHERE ($1::text IS NULL OR exam_name = $1)
              AND ($2::text[] IS NULL OR topic = ANY($2))
              AND NOT (id = ANY($3))
            ORDER BY random()
            LIMIT $4
            "#,
        )
        .bind(filter.exam_name.as_deref())
        .bind(filter.topics.as_deref())
        .bind(exclude)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn topic_meta(
        &self,
        ids: &[i64],
    ) -> Result<HashMap<i64, (Option<String>, Option<String>)>> {
        let rows = sqlx::query_as::<_, (i64, Option<String>, Option<String>)>(
            r#"SELECT id, topic, subtopic FROM questions WHERE id = ANY($1)"#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, topic, subtopic)| (id, (topic, subtopic)))
            .collect())
    }

    async fn fetch_questions(&self, ids: &[i64]) -> Result<Vec<QuestionWithChoices>> {
        let questions = sqlx::query_as::<_, Question>(
            r#"SELECT * FROM questions WHERE id = ANY($1) ORDER BY id"#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let choices = sqlx::query_as::<_, Choice>(
            r#"SELECT * FROM choices WHERE question_id = ANY($1) ORDER BY question_id, label"#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<i64, Vec<Choice>> = HashMap::new();
        for choice in choices {
            grouped.entry(choice.question_id).or_default().push(choice);
        }

        Ok(questions
            .into_iter()
            .map(|question| {
                let choices = grouped.remove(&question.id).unwrap_or_default();
                QuestionWithChoices { question, choices }
            })
            .collect())
    }

    async fn correct_labels(&self, ids: &[i64]) -> Result<HashMap<i64, String>> {
        let rows = sqlx::query_as::<_, (i64, String)>(
            r#"SELECT question_id, label FROM choices WHERE question_id = ANY($1) AND is_correct"#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }
}
