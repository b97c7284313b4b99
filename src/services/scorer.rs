//! Pure scoring over a locked question set and the user's selections.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::error::{Error, Result};

pub const PASSING_PERCENT: i32 = 70;

/// Breakdown bucket for questions whose denormalized topic is NULL.
pub const UNKNOWN_TOPIC: &str = "Unknown";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TopicScore {
    pub correct: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreOutcome {
    pub total_questions: i64,
    pub correct: i64,
    pub score_percent: i32,
    pub passed: bool,
    pub breakdown_by_topic: BTreeMap<String, TopicScore>,
}

/// Scores one attempt. A question counts as correct iff a selection exists
/// and equals the correct label exactly. `score_percent` is rounded half up
/// to the nearest integer; passing is fixed at 70.
///
/// An attempt is never created with zero questions; re-checked here anyway.
pub fn score_attempt(
    question_ids: &[i64],
    topic_by_question: &HashMap<i64, Option<String>>,
    correct_labels: &HashMap<i64, String>,
    selected_labels: &HashMap<i64, String>,
) -> Result<ScoreOutcome> {
    if question_ids.is_empty() {
        return Err(Error::BadRequest("Attempt has no questions".to_string()));
    }

    let total = question_ids.len() as i64;
    let mut correct = 0i64;
    let mut breakdown: BTreeMap<String, TopicScore> = BTreeMap::new();

    for question_id in question_ids {
        let topic = topic_by_question
            .get(question_id)
            .and_then(|t| t.clone())
            .unwrap_or_else(|| UNKNOWN_TOPIC.to_string());
        let entry = breakdown.entry(topic).or_default();
        entry.total += 1;

        let is_correct = match (
            selected_labels.get(question_id),
            correct_labels.get(question_id),
        ) {
            (Some(selected), Some(expected)) => selected == expected,
            _ => false,
        };
        if is_correct {
            correct += 1;
            entry.correct += 1;
        }
    }

    let score_percent = (correct as f64 / total as f64 * 100.0).round() as i32;
    let passed = score_percent >= PASSING_PERCENT;

    Ok(ScoreOutcome {
        total_questions: total,
        correct,
        score_percent,
        passed,
        breakdown_by_topic: breakdown,
    })
}
