use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::attempt::DEFAULT_QUESTION_COUNT;

#[derive(Debug, Deserialize, Validate)]
pub struct StartAttemptRequest {
    /// "practice" or "timed"; parsed into the closed mode enum at the
    /// handler boundary.
    pub mode: String,
    pub exam_name: Option<String>,
    /// Optional topic allowlist.
    pub topics: Option<Vec<String>>,
    #[serde(default = "default_question_count")]
    #[validate(range(min = 1, max = 300))]
    pub question_count: i32,
    /// Timed mode only; the backend default applies when omitted.
    #[validate(range(min = 60))]
    pub time_limit_seconds: Option<i32>,
}

fn default_question_count() -> i32 {
    DEFAULT_QUESTION_COUNT
}

#[derive(Debug, Deserialize, Validate)]
pub struct AnswerRequest {
    pub question_id: i64,
    #[validate(length(min = 1, max = 1))]
    pub selected_label: String,
}

#[derive(Debug, Serialize)]
pub struct AnswerAck {
    pub saved: bool,
    pub question_id: i64,
    pub answered_at: DateTime<Utc>,
}
