//! In-memory store implementations backing the integration tests, so the
//! exam flow and router can be driven without a database.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use quiz_backend::error::{Error, Result};
use quiz_backend::models::attempt::{
    AttemptQuestion, ExamAnswer, ExamAttempt, LockedQuestion, NewAttempt,
};
use quiz_backend::models::question::{Choice, Question, QuestionWithChoices};
use quiz_backend::models::user::User;
use quiz_backend::services::question_bank::{BankFilter, QuestionBank};
use quiz_backend::services::stores::{AttemptStore, UserStore};

pub fn bank_question(
    id: i64,
    topic: Option<&str>,
    subtopic: Option<&str>,
    correct_label: &str,
) -> QuestionWithChoices {
    let choices = ["A", "B", "C", "D"]
        .iter()
        .enumerate()
        .map(|(index, label)| Choice {
            id: id * 10 + index as i64,
            question_id: id,
            label: label.to_string(),
            text: format!("Choice {} for question {}", label, id),
            is_correct: *label == correct_label,
        })
        .collect();

    QuestionWithChoices {
        question: Question {
            id,
            text: format!("Question {}?", id),
            explanation: Some(format!("Because of rule {}", id)),
            topic: topic.map(str::to_string),
            subtopic: subtopic.map(str::to_string),
            exam_name: None,
            question_number: None,
        },
        choices,
    }
}

/// 100 questions: T1 with subtopics S1/S2 (30 each), T2 without subtopics
/// (40). Every correct answer is "A".
pub fn seed_bank() -> MemBank {
    let mut questions = Vec::new();
    for id in 1..=30 {
        questions.push(bank_question(id, Some("T1"), Some("S1"), "A"));
    }
    for id in 31..=60 {
        questions.push(bank_question(id, Some("T1"), Some("S2"), "A"));
    }
    for id in 61..=100 {
        questions.push(bank_question(id, Some("T2"), None, "A"));
    }
    MemBank::new(questions)
}

pub struct MemBank {
    questions: Vec<QuestionWithChoices>,
    rng: Mutex<StdRng>,
}

impl MemBank {
    pub fn new(questions: Vec<QuestionWithChoices>) -> Self {
        Self {
            questions,
            rng: Mutex::new(StdRng::seed_from_u64(0xC0FFEE)),
        }
    }

    fn filtered<'a>(
        &'a self,
        filter: &'a BankFilter,
    ) -> impl Iterator<Item = &'a QuestionWithChoices> {
        self.questions.iter().filter(move |q| {
            if let Some(exam) = filter.exam_name.as_deref() {
                if q.question.exam_name.as_deref() != Some(exam) {
                    return false;
                }
            }
            if let Some(topics) = filter.topics.as_deref() {
                match q.question.topic.as_deref() {
                    Some(topic) if topics.iter().any(|t| t == topic) => {}
                    _ => return false,
                }
            }
            true
        })
    }

    fn shuffled(&self, mut ids: Vec<i64>, limit: i64) -> Vec<i64> {
        let mut rng = self.rng.lock().expect("bank rng poisoned");
        ids.shuffle(&mut *rng);
        ids.truncate(limit as usize);
        ids
    }
}

#[async_trait]
impl QuestionBank for MemBank {
    async fn topic_counts(&self, filter: &BankFilter) -> Result<Vec<(String, i64)>> {
        let mut counts: HashMap<String, i64> = HashMap::new();
        for q in self.filtered(filter) {
            if let Some(topic) = &q.question.topic {
                *counts.entry(topic.clone()).or_default() += 1;
            }
        }
        Ok(counts.into_iter().collect())
    }

    async fn subtopic_counts(
        &self,
        filter: &BankFilter,
    ) -> Result<Vec<(String, Option<String>, i64)>> {
        let mut counts: HashMap<(String, Option<String>), i64> = HashMap::new();
        for q in self.filtered(filter) {
            if let Some(topic) = &q.question.topic {
                *counts
                    .entry((topic.clone(), q.question.subtopic.clone()))
                    .or_default() += 1;
            }
        }
        Ok(counts
            .into_iter()
            .map(|((topic, subtopic), count)| (topic, subtopic, count))
            .collect())
    }

    async fn sample_bucket<'a>(
        &self,
        filter: &BankFilter,
        topic: &str,
        subtopic: Option<&'a str>,
        limit: i64,
    ) -> Result<Vec<i64>> {
        let ids: Vec<i64> = self
            .filtered(filter)
            .filter(|q| {
                q.question.topic.as_deref() == Some(topic)
                    && q.question.subtopic.as_deref() == subtopic
            })
            .map(|q| q.question.id)
            .collect();
        Ok(self.shuffled(ids, limit))
    }

    async fn sample_filler(
        &self,
        filter: &BankFilter,
        exclude: &[i64],
        limit: i64,
    ) -> Result<Vec<i64>> {
        let ids: Vec<i64> = self
            .filtered(filter)
            .map(|q| q.question.id)
            .filter(|id| !exclude.contains(id))
            .collect();
        Ok(self.shuffled(ids, limit))
    }

    async fn topic_meta(
        &self,
        ids: &[i64],
    ) -> Result<HashMap<i64, (Option<String>, Option<String>)>> {
        Ok(self
            .questions
            .iter()
            .filter(|q| ids.contains(&q.question.id))
            .map(|q| {
                (
                    q.question.id,
                    (q.question.topic.clone(), q.question.subtopic.clone()),
                )
            })
            .collect())
    }

    async fn fetch_questions(&self, ids: &[i64]) -> Result<Vec<QuestionWithChoices>> {
        Ok(self
            .questions
            .iter()
            .filter(|q| ids.contains(&q.question.id))
            .cloned()
            .collect())
    }

    async fn correct_labels(&self, ids: &[i64]) -> Result<HashMap<i64, String>> {
        Ok(self
            .questions
            .iter()
            .filter(|q| ids.contains(&q.question.id))
            .filter_map(|q| {
                q.choices
                    .iter()
                    .find(|c| c.is_correct)
                    .map(|c| (q.question.id, c.label.clone()))
            })
            .collect())
    }
}

#[derive(Default)]
struct AttemptsInner {
    attempts: HashMap<i64, ExamAttempt>,
    questions: Vec<AttemptQuestion>,
    answers: Vec<ExamAnswer>,
    next_attempt_id: i64,
    next_row_id: i64,
}

#[derive(Default)]
pub struct MemAttemptStore {
    inner: Mutex<AttemptsInner>,
}

impl MemAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: moves started_at into the past to trigger expiry.
    pub fn backdate_attempt(&self, attempt_id: i64, seconds: i64) {
        let mut inner = self.inner.lock().expect("attempt store poisoned");
        if let Some(attempt) = inner.attempts.get_mut(&attempt_id) {
            attempt.started_at = attempt.started_at - Duration::seconds(seconds);
        }
    }

    pub fn answer_rows(&self, attempt_id: i64) -> usize {
        let inner = self.inner.lock().expect("attempt store poisoned");
        inner
            .answers
            .iter()
            .filter(|a| a.attempt_id == attempt_id)
            .count()
    }
}

#[async_trait]
impl AttemptStore for MemAttemptStore {
    async fn create_attempt(
        &self,
        new: NewAttempt,
        locked: &[LockedQuestion],
    ) -> Result<ExamAttempt> {
        let mut inner = self.inner.lock().expect("attempt store poisoned");
        inner.next_attempt_id += 1;
        let attempt = ExamAttempt {
            id: inner.next_attempt_id,
            user_id: new.user_id,
            mode: new.mode,
            exam_name: new.exam_name,
            question_count: new.question_count,
            time_limit_seconds: new.time_limit_seconds,
            started_at: new.started_at,
            submitted_at: None,
            score_percent: None,
            passed: None,
        };
        inner.attempts.insert(attempt.id, attempt.clone());
        for entry in locked {
            inner.next_row_id += 1;
            let row = AttemptQuestion {
                id: inner.next_row_id,
                attempt_id: attempt.id,
                question_id: entry.question_id,
                position: entry.position,
                topic: entry.topic.clone(),
                subtopic: entry.subtopic.clone(),
            };
            inner.questions.push(row);
        }
        Ok(attempt)
    }

    async fn attempt(&self, attempt_id: i64) -> Result<Option<ExamAttempt>> {
        let inner = self.inner.lock().expect("attempt store poisoned");
        Ok(inner.attempts.get(&attempt_id).cloned())
    }

    async fn attempts_for_user(&self, user_id: i64, limit: i64) -> Result<Vec<ExamAttempt>> {
        let inner = self.inner.lock().expect("attempt store poisoned");
        let mut attempts: Vec<ExamAttempt> = inner
            .attempts
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        attempts.sort_by(|a, b| b.id.cmp(&a.id));
        attempts.truncate(limit as usize);
        Ok(attempts)
    }

    async fn questions_for(&self, attempt_id: i64) -> Result<Vec<AttemptQuestion>> {
        let inner = self.inner.lock().expect("attempt store poisoned");
        let mut rows: Vec<AttemptQuestion> = inner
            .questions
            .iter()
            .filter(|q| q.attempt_id == attempt_id)
            .cloned()
            .collect();
        rows.sort_by_key(|q| q.position);
        Ok(rows)
    }

    async fn question_at(
        &self,
        attempt_id: i64,
        position: i32,
    ) -> Result<Option<AttemptQuestion>> {
        let inner = self.inner.lock().expect("attempt store poisoned");
        Ok(inner
            .questions
            .iter()
            .find(|q| q.attempt_id == attempt_id && q.position == position)
            .cloned())
    }

    async fn is_locked_question(&self, attempt_id: i64, question_id: i64) -> Result<bool> {
        let inner = self.inner.lock().expect("attempt store poisoned");
        Ok(inner
            .questions
            .iter()
            .any(|q| q.attempt_id == attempt_id && q.question_id == question_id))
    }

    async fn upsert_answer(
        &self,
        attempt_id: i64,
        question_id: i64,
        selected_label: &str,
        answered_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut inner = self.inner.lock().expect("attempt store poisoned");
        let active = inner
            .attempts
            .get(&attempt_id)
            .map(|a| a.submitted_at.is_none())
            .unwrap_or(false);
        if !active {
            return Ok(false);
        }
        let existing = inner
            .answers
            .iter()
            .position(|a| a.attempt_id == attempt_id && a.question_id == question_id);
        match existing {
            Some(index) => {
                let row = &mut inner.answers[index];
                row.selected_label = Some(selected_label.to_string());
                row.answered_at = Some(answered_at);
            }
            None => {
                inner.next_row_id += 1;
                let row = ExamAnswer {
                    id: inner.next_row_id,
                    attempt_id,
                    question_id,
                    selected_label: Some(selected_label.to_string()),
                    answered_at: Some(answered_at),
                };
                inner.answers.push(row);
            }
        }
        Ok(true)
    }

    async fn answers_for(&self, attempt_id: i64) -> Result<HashMap<i64, String>> {
        let inner = self.inner.lock().expect("attempt store poisoned");
        Ok(inner
            .answers
            .iter()
            .filter(|a| a.attempt_id == attempt_id)
            .filter_map(|a| a.selected_label.clone().map(|l| (a.question_id, l)))
            .collect())
    }

    async fn answer_for(&self, attempt_id: i64, question_id: i64) -> Result<Option<String>> {
        let inner = self.inner.lock().expect("attempt store poisoned");
        Ok(inner
            .answers
            .iter()
            .find(|a| a.attempt_id == attempt_id && a.question_id == question_id)
            .and_then(|a| a.selected_label.clone()))
    }

    async fn finalize(
        &self,
        attempt_id: i64,
        submitted_at: DateTime<Utc>,
        score_percent: i32,
        passed: bool,
    ) -> Result<bool> {
        let mut inner = self.inner.lock().expect("attempt store poisoned");
        let Some(attempt) = inner.attempts.get_mut(&attempt_id) else {
            return Ok(false);
        };
        if attempt.submitted_at.is_some() {
            return Ok(false);
        }
        attempt.submitted_at = Some(submitted_at);
        attempt.score_percent = Some(score_percent);
        attempt.passed = Some(passed);
        Ok(true)
    }
}

#[derive(Default)]
pub struct MemUserStore {
    users: Mutex<Vec<User>>,
}

impl MemUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemUserStore {
    async fn create(&self, email: &str, password_hash: &str) -> Result<User> {
        let mut users = self.users.lock().expect("user store poisoned");
        if users.iter().any(|u| u.email == email) {
            return Err(Error::Conflict("Email already registered".to_string()));
        }
        let user = User {
            id: users.len() as i64 + 1,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role: "user".to_string(),
            created_at: Utc::now(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.lock().expect("user store poisoned");
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn by_id(&self, id: i64) -> Result<Option<User>> {
        let users = self.users.lock().expect("user store poisoned");
        Ok(users.iter().find(|u| u.id == id).cloned())
    }
}
