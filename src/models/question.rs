use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Fixed answer alphabet; every choice label and submitted answer must be
/// one of these.
pub const VALID_LABELS: [&str; 4] = ["A", "B", "C", "D"];

pub fn is_valid_label(label: &str) -> bool {
    VALID_LABELS.contains(&label)
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Question {
    pub id: i64,
    pub text: String,
    pub explanation: Option<String>,
    pub topic: Option<String>,
    pub subtopic: Option<String>,
    pub exam_name: Option<String>,
    pub question_number: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Choice {
    pub id: i64,
    pub question_id: i64,
    pub label: String,
    pub text: String,
    pub is_correct: bool,
}

/// A question with its choices, assembled by explicit batch fetches at the
/// store boundary.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionWithChoices {
    #[serde(flatten)]
    pub question: Question,
    pub choices: Vec<Choice>,
}
