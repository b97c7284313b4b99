//! Lifecycle of one exam attempt: start, question access, answer recording,
//! submission, result retrieval, and review. Every operation resolves the
//! attempt, checks ownership, then applies its state guards.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::attempt::{
    AttemptMode, ExamAttempt, NewAttempt, DEFAULT_TIMED_SECONDS,
};
use crate::models::question::{is_valid_label, QuestionWithChoices};
use crate::services::assembler;
use crate::services::question_bank::{BankFilter, QuestionBank};
use crate::services::scorer::{self, ScoreOutcome, TopicScore};
use crate::services::stores::AttemptStore;

#[derive(Debug, Clone)]
pub struct StartAttempt {
    pub mode: AttemptMode,
    pub exam_name: Option<String>,
    pub topics: Option<Vec<String>>,
    pub question_count: i32,
    pub time_limit_seconds: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptSummary {
    pub attempt_id: i64,
    pub mode: AttemptMode,
    pub exam_name: Option<String>,
    pub question_count: i32,
    pub time_limit_seconds: Option<i32>,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub score_percent: Option<i32>,
    pub passed: Option<bool>,
}

impl From<ExamAttempt> for AttemptSummary {
    fn from(attempt: ExamAttempt) -> Self {
        Self {
            attempt_id: attempt.id,
            mode: attempt.mode,
            exam_name: attempt.exam_name,
            question_count: attempt.question_count,
            time_limit_seconds: attempt.time_limit_seconds,
            started_at: attempt.started_at,
            submitted_at: attempt.submitted_at,
            score_percent: attempt.score_percent,
            passed: attempt.passed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChoiceView {
    pub label: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub attempt_id: i64,
    pub position: i32,
    pub question_id: i64,
    pub text: String,
    pub topic: Option<String>,
    pub subtopic: Option<String>,
    pub choices: Vec<ChoiceView>,
    pub explanation: Option<String>,
    pub selected_label: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptResult {
    pub attempt_id: i64,
    pub score_percent: i32,
    pub passed: bool,
    pub total_questions: i64,
    pub correct: i64,
    pub breakdown_by_topic: BTreeMap<String, TopicScore>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewItem {
    pub position: i32,
    pub question_id: i64,
    pub text: String,
    pub topic: Option<String>,
    pub subtopic: Option<String>,
    pub choices: Vec<ChoiceView>,
    pub selected_label: Option<String>,
    pub correct_label: Option<String>,
    pub explanation: Option<String>,
}

#[derive(Clone)]
pub struct ExamFlow {
    bank: Arc<dyn QuestionBank>,
    attempts: Arc<dyn AttemptStore>,
}

impl ExamFlow {
    pub fn new(bank: Arc<dyn QuestionBank>, attempts: Arc<dyn AttemptStore>) -> Self {
        Self { bank, attempts }
    }

    /// Creates an attempt with a balanced, locked question set. Practice
    /// attempts never carry a limit; timed attempts default to 150 minutes.
    pub async fn start_attempt(
        &self,
        req: StartAttempt,
        user_id: i64,
        rng: &mut (impl Rng + Send),
    ) -> Result<ExamAttempt> {
        let time_limit_seconds = match req.mode {
            AttemptMode::Timed => req.time_limit_seconds.or(Some(DEFAULT_TIMED_SECONDS)),
            AttemptMode::Practice => None,
        };

        let filter = BankFilter::new(req.exam_name.clone(), req.topics);
        let locked = assembler::assemble_locked_set(
            self.bank.as_ref(),
            &filter,
            req.question_count as usize,
            rng,
        )
        .await?;

        let attempt = self
            .attempts
            .create_attempt(
                NewAttempt {
                    user_id,
                    mode: req.mode,
                    exam_name: req.exam_name,
                    question_count: req.question_count,
                    time_limit_seconds,
                    started_at: Utc::now(),
                },
                &locked,
            )
            .await?;

        tracing::info!(
            attempt_id = attempt.id,
            user_id,
            mode = attempt.mode.as_str(),
            question_count = attempt.question_count,
            "attempt started"
        );
        Ok(attempt)
    }

    /// The question at one locked position with the caller's saved answer.
    /// Explanations are withheld on unsubmitted timed attempts.
    pub async fn question_at(
        &self,
        attempt_id: i64,
        position: i32,
        user_id: i64,
    ) -> Result<QuestionView> {
        let attempt = self.owned_attempt(attempt_id, user_id).await?;
        ensure_not_expired(&attempt, Utc::now())?;

        let locked = self
            .attempts
            .question_at(attempt_id, position)
            .await?
            .ok_or_else(|| Error::NotFound("Question position not found".to_string()))?;

        let mut questions = self.bank.fetch_questions(&[locked.question_id]).await?;
        let question = questions
            .pop()
            .ok_or_else(|| Error::NotFound("Question not found".to_string()))?;

        let selected_label = self
            .attempts
            .answer_for(attempt_id, locked.question_id)
            .await?;

        let choices = choice_views(&question);

        let explanation = if explanation_visible(&attempt) {
            question.question.explanation
        } else {
            None
        };

        Ok(QuestionView {
            attempt_id,
            position: locked.position,
            question_id: locked.question_id,
            text: question.question.text,
            topic: locked.topic,
            subtopic: locked.subtopic,
            choices,
            explanation,
            selected_label,
        })
    }

    /// Upserts the caller's answer for one locked question. Only valid while
    /// the attempt is active and, for timed mode, within the time limit.
    pub async fn record_answer(
        &self,
        attempt_id: i64,
        question_id: i64,
        selected_label: &str,
        user_id: i64,
    ) -> Result<DateTime<Utc>> {
        let attempt = self.owned_attempt(attempt_id, user_id).await?;
        ensure_active(&attempt)?;
        ensure_not_expired(&attempt, Utc::now())?;

        if !is_valid_label(selected_label) {
            return Err(Error::BadRequest(format!(
                "Invalid choice label: {}",
                selected_label
            )));
        }
        if !self
            .attempts
            .is_locked_question(attempt_id, question_id)
            .await?
        {
            return Err(Error::BadRequest(
                "Question does not belong to this attempt".to_string(),
            ));
        }

        let answered_at = Utc::now();
        let saved = self
            .attempts
            .upsert_answer(attempt_id, question_id, selected_label, answered_at)
            .await?;
        if !saved {
            // A concurrent submit won the race after the guards above ran.
            return Err(Error::Conflict("Attempt already submitted".to_string()));
        }
        Ok(answered_at)
    }

    /// Scores the attempt and freezes submitted_at/score_percent/passed.
    /// Intentionally not idempotent: a repeat call fails with Conflict.
    pub async fn submit(&self, attempt_id: i64, user_id: i64) -> Result<AttemptResult> {
        let attempt = self.owned_attempt(attempt_id, user_id).await?;
        ensure_active(&attempt)?;

        let outcome = self.compute_outcome(attempt_id).await?;

        let submitted_at = Utc::now();
        let frozen = self
            .attempts
            .finalize(attempt_id, submitted_at, outcome.score_percent, outcome.passed)
            .await?;
        if !frozen {
            // Lost the race against a concurrent submit.
            return Err(Error::Conflict("Attempt already submitted".to_string()));
        }

        tracing::info!(
            attempt_id,
            score_percent = outcome.score_percent,
            passed = outcome.passed,
            "attempt submitted"
        );

        Ok(AttemptResult {
            attempt_id,
            score_percent: outcome.score_percent,
            passed: outcome.passed,
            total_questions: outcome.total_questions,
            correct: outcome.correct,
            breakdown_by_topic: outcome.breakdown_by_topic,
            submitted_at,
        })
    }

    /// Read-only result for a submitted attempt. Totals and breakdown are
    /// recomputed for response symmetry; the headline numbers stay whatever
    /// was frozen at submit time.
    pub async fn result(&self, attempt_id: i64, user_id: i64) -> Result<AttemptResult> {
        let attempt = self.owned_attempt(attempt_id, user_id).await?;
        let (Some(submitted_at), Some(score_percent), Some(passed)) =
            (attempt.submitted_at, attempt.score_percent, attempt.passed)
        else {
            return Err(Error::Conflict("Attempt not submitted yet".to_string()));
        };

        let outcome = self.compute_outcome(attempt_id).await?;

        Ok(AttemptResult {
            attempt_id,
            score_percent,
            passed,
            total_questions: outcome.total_questions,
            correct: outcome.correct,
            breakdown_by_topic: outcome.breakdown_by_topic,
            submitted_at,
        })
    }

    /// Every locked question in position order with selections, correct
    /// labels, and explanations. Timed attempts are reviewable only after
    /// submission; practice attempts always.
    pub async fn review(&self, attempt_id: i64, user_id: i64) -> Result<Vec<ReviewItem>> {
        let attempt = self.owned_attempt(attempt_id, user_id).await?;
        if attempt.mode == AttemptMode::Timed && !attempt.is_submitted() {
            return Err(Error::Forbidden(
                "Review available after submission".to_string(),
            ));
        }

        let locked = self.attempts.questions_for(attempt_id).await?;
        let question_ids: Vec<i64> = locked.iter().map(|lq| lq.question_id).collect();

        let questions = self.bank.fetch_questions(&question_ids).await?;
        let mut by_id: HashMap<i64, QuestionWithChoices> = questions
            .into_iter()
            .map(|q| (q.question.id, q))
            .collect();
        let correct = self.bank.correct_labels(&question_ids).await?;
        let selected = self.attempts.answers_for(attempt_id).await?;

        let mut items = Vec::with_capacity(locked.len());
        for entry in locked {
            let Some(question) = by_id.remove(&entry.question_id) else {
                continue;
            };
            items.push(ReviewItem {
                position: entry.position,
                question_id: entry.question_id,
                text: question.question.text.clone(),
                topic: entry.topic,
                subtopic: entry.subtopic,
                choices: choice_views(&question),
                selected_label: selected.get(&entry.question_id).cloned(),
                correct_label: correct.get(&entry.question_id).cloned(),
                explanation: question.question.explanation.clone(),
            });
        }
        Ok(items)
    }

    pub async fn attempt_meta(&self, attempt_id: i64, user_id: i64) -> Result<AttemptSummary> {
        let attempt = self.owned_attempt(attempt_id, user_id).await?;
        Ok(AttemptSummary::from(attempt))
    }

    pub async fn attempts_for_user(&self, user_id: i64) -> Result<Vec<AttemptSummary>> {
        let attempts = self.attempts.attempts_for_user(user_id, 50).await?;
        Ok(attempts.into_iter().map(AttemptSummary::from).collect())
    }

    async fn owned_attempt(&self, attempt_id: i64, user_id: i64) -> Result<ExamAttempt> {
        let attempt = self
            .attempts
            .attempt(attempt_id)
            .await?
            .ok_or_else(|| Error::NotFound("Attempt not found".to_string()))?;
        ensure_owner(&attempt, user_id)?;
        Ok(attempt)
    }

    async fn compute_outcome(&self, attempt_id: i64) -> Result<ScoreOutcome> {
        let locked = self.attempts.questions_for(attempt_id).await?;
        let question_ids: Vec<i64> = locked.iter().map(|lq| lq.question_id).collect();
        let topic_by_question: HashMap<i64, Option<String>> = locked
            .iter()
            .map(|lq| (lq.question_id, lq.topic.clone()))
            .collect();

        let correct = self.bank.correct_labels(&question_ids).await?;
        let selected = self.attempts.answers_for(attempt_id).await?;

        scorer::score_attempt(&question_ids, &topic_by_question, &correct, &selected)
    }
}

fn choice_views(question: &QuestionWithChoices) -> Vec<ChoiceView> {
    let mut choices: Vec<ChoiceView> = question
        .choices
        .iter()
        .map(|c| ChoiceView {
            label: c.label.clone(),
            text: c.text.clone(),
        })
        .collect();
    choices.sort_by(|a, b| a.label.cmp(&b.label));
    choices
}

fn explanation_visible(attempt: &ExamAttempt) -> bool {
    attempt.mode == AttemptMode::Practice || attempt.is_submitted()
}

fn ensure_owner(attempt: &ExamAttempt, user_id: i64) -> Result<()> {
    if attempt.user_id != user_id {
        return Err(Error::Forbidden("Forbidden".to_string()));
    }
    Ok(())
}

fn ensure_active(attempt: &ExamAttempt) -> Result<()> {
    if attempt.is_submitted() {
        return Err(Error::Conflict("Attempt already submitted".to_string()));
    }
    Ok(())
}

/// Soft lock for timed attempts: past the limit every triggering operation
/// fails, but the state stays Active until an explicit submit.
fn ensure_not_expired(attempt: &ExamAttempt, now: DateTime<Utc>) -> Result<()> {
    if attempt.mode != AttemptMode::Timed || attempt.is_submitted() {
        return Ok(());
    }
    let Some(limit) = attempt.time_limit_seconds else {
        return Ok(());
    };

    let elapsed = now.signed_duration_since(attempt.started_at).num_seconds();
    if elapsed > limit as i64 {
        return Err(Error::Expired(
            "Time limit exceeded. Please submit the attempt.".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn attempt(mode: AttemptMode, limit: Option<i32>) -> ExamAttempt {
        ExamAttempt {
            id: 1,
            user_id: 42,
            mode,
            exam_name: None,
            question_count: 10,
            time_limit_seconds: limit,
            started_at: Utc::now(),
            submitted_at: None,
            score_percent: None,
            passed: None,
        }
    }

    #[test]
    fn owner_mismatch_is_forbidden() {
        let a = attempt(AttemptMode::Practice, None);
        assert!(ensure_owner(&a, 42).is_ok());
        assert!(matches!(
            ensure_owner(&a, 7),
            Err(Error::Forbidden(_))
        ));
    }

    #[test]
    fn submitted_attempt_is_no_longer_active() {
        let mut a = attempt(AttemptMode::Practice, None);
        assert!(ensure_active(&a).is_ok());
        a.submitted_at = Some(Utc::now());
        assert!(matches!(ensure_active(&a), Err(Error::Conflict(_))));
    }

    #[test]
    fn practice_attempts_never_expire() {
        let mut a = attempt(AttemptMode::Practice, None);
        a.started_at = Utc::now() - Duration::days(30);
        assert!(ensure_not_expired(&a, Utc::now()).is_ok());
    }

    #[test]
    fn timed_attempt_expires_past_its_limit() {
        let mut a = attempt(AttemptMode::Timed, Some(600));
        a.started_at = Utc::now() - Duration::seconds(601);
        assert!(matches!(
            ensure_not_expired(&a, Utc::now()),
            Err(Error::Expired(_))
        ));
    }

    #[test]
    fn timed_attempt_within_limit_is_fine() {
        let mut a = attempt(AttemptMode::Timed, Some(600));
        a.started_at = Utc::now() - Duration::seconds(30);
        assert!(ensure_not_expired(&a, Utc::now()).is_ok());
    }

    #[test]
    fn submitted_timed_attempt_skips_the_expiry_check() {
        let mut a = attempt(AttemptMode::Timed, Some(600));
        a.started_at = Utc::now() - Duration::days(2);
        a.submitted_at = Some(Utc::now());
        assert!(ensure_not_expired(&a, Utc::now()).is_ok());
    }

    #[test]
    fn explanations_hidden_on_active_timed_attempts() {
        let mut timed = attempt(AttemptMode::Timed, Some(600));
        assert!(!explanation_visible(&timed));
        timed.submitted_at = Some(Utc::now());
        assert!(explanation_visible(&timed));

        let practice = attempt(AttemptMode::Practice, None);
        assert!(explanation_visible(&practice));
    }
}
