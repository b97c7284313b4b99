use sqlx::PgPool;

use crate::dto::question_dto::CreateQuestionRequest;
use crate::error::{Error, Result};
use crate::models::question::{is_valid_label, Choice, Question, QuestionWithChoices};

/// Admin-side question management; the exam flow itself only ever reads the
/// bank through the QuestionBank trait.
#[derive(Clone)]
pub struct QuestionService {
    pool: PgPool,
}

impl QuestionService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_question(
        &self,
        payload: CreateQuestionRequest,
    ) -> Result<QuestionWithChoices> {
        let mut labels: Vec<&str> = Vec::with_capacity(payload.choices.len());
        let mut correct_count = 0usize;
        for choice in &payload.choices {
            let label = choice.label.trim();
            if !is_valid_label(label) {
                return Err(Error::BadRequest(format!(
                    "Invalid choice label: {}",
                    choice.label
                )));
            }
            if labels.contains(&label) {
                return Err(Error::BadRequest(format!(
                    "Duplicate choice label: {}",
                    label
                )));
            }
            labels.push(label);
            if choice.is_correct {
                correct_count += 1;
            }
        }
        if correct_count != 1 {
            return Err(Error::BadRequest(
                "Exactly one choice must be marked correct".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let question = sqlx::query_as::<_, Question>(
            r#"
            INSERT INTO questions (text, explanation, topic, subtopic, exam_name, question_number)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(payload.text.trim())
        .bind(normalize(payload.explanation))
        .bind(normalize(payload.topic))
        .bind(normalize(payload.subtopic))
        .bind(normalize(payload.exam_name))
        .bind(payload.question_number)
        .fetch_one(&mut *tx)
        .await?;

        let mut choices = Vec::with_capacity(payload.choices.len());
        for choice in &payload.choices {
            let row = sqlx::query_as::<_, Choice>(
                r#"
                INSERT INTO choices (question_id, label, text, is_correct)
                VALUES ($1, $2, $3, $4)
                RETURNING *
                "#,
            )
            .bind(question.id)
            .bind(choice.label.trim())
            .bind(choice.text.trim())
            .bind(choice.is_correct)
            .fetch_one(&mut *tx)
            .await?;
            choices.push(row);
        }

        tx.commit().await?;

        choices.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(QuestionWithChoices { question, choices })
    }

    pub async fn list_questions(&self, limit: i64) -> Result<Vec<QuestionWithChoices>> {
        let questions = sqlx::query_as::<_, Question>(
            r#"SELECT * FROM questions ORDER BY id DESC LIMIT $1"#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<i64> = questions.iter().map(|q| q.id).collect();
        let choices = sqlx::query_as::<_, Choice>(
            r#"SELECT * FROM choices WHERE question_id = ANY($1) ORDER BY question_id, label"#,
        )
        .bind(&ids[..])
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: std::collections::HashMap<i64, Vec<Choice>> =
            std::collections::HashMap::new();
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
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
