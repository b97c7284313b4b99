use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{Error, Result};

pub const DEFAULT_QUESTION_COUNT: i32 = 150;
pub const DEFAULT_TIMED_SECONDS: i32 = 150 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "attempt_mode", rename_all = "lowercase")]
pub enum AttemptMode {
    Practice,
    Timed,
}

impl AttemptMode {
    /// Boundary parse; invalid modes are unrepresentable past this point.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "practice" => Ok(AttemptMode::Practice),
            "timed" => Ok(AttemptMode::Timed),
            other => Err(Error::BadRequest(format!("Invalid mode: {}", other))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptMode::Practice => "practice",
            AttemptMode::Timed => "timed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExamAttempt {
    pub id: i64,
    pub user_id: i64,
    pub mode: AttemptMode,
    pub exam_name: Option<String>,
    pub question_count: i32,
    pub time_limit_seconds: Option<i32>,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub score_percent: Option<i32>,
    pub passed: Option<bool>,
}

impl ExamAttempt {
    pub fn is_submitted(&self) -> bool {
        self.submitted_at.is_some()
    }
}

/// Attempt fields known before the row exists.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub user_id: i64,
    pub mode: AttemptMode,
    pub exam_name: Option<String>,
    pub question_count: i32,
    pub time_limit_seconds: Option<i32>,
    pub started_at: DateTime<Utc>,
}

/// One entry of the locked set before it is tied to an attempt id. Topic and
/// subtopic are captured here so score breakdowns never re-join the bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedQuestion {
    pub question_id: i64,
    pub position: i32,
    pub topic: Option<String>,
    pub subtopic: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AttemptQuestion {
    pub id: i64,
    pub attempt_id: i64,
    pub question_id: i64,
    pub position: i32,
    pub topic: Option<String>,
    pub subtopic: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExamAnswer {
    pub id: i64,
    pub attempt_id: i64,
    pub question_id: i64,
    pub selected_label: Option<String>,
    pub answered_at: Option<DateTime<Utc>>,
}
