use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::question::QuestionWithChoices;

/// Filters applied to every bank query during assembly. The topic allowlist
/// is normalized once at construction: trimmed, empties dropped, first
/// occurrence wins.
#[derive(Debug, Clone, Default)]
pub struct BankFilter {
    pub exam_name: Option<String>,
    pub topics: Option<Vec<String>>,
}

impl BankFilter {
    pub fn new(exam_name: Option<String>, topics: Option<Vec<String>>) -> Self {
        let topics = topics
            .map(|list| {
                let mut clean: Vec<String> = Vec::with_capacity(list.len());
                for raw in list {
                    let topic = raw.trim();
                    if !topic.is_empty() && !clean.iter().any(|t| t == topic) {
                        clean.push(topic.to_string());
                    }
                }
                clean
            })
            .filter(|list| !list.is_empty());

        Self { exam_name, topics }
    }
}

/// Read-only view of the question bank. Sampling is uniform and the bank
/// owns its own randomness; NULL subtopics form their own bucket.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuestionBank: Send + Sync {
    /// Question counts per non-NULL topic under the filter.
    async fn topic_counts(&self, filter: &BankFilter) -> Result<Vec<(String, i64)>>;

    /// Question counts per (topic, subtopic) pair, non-NULL topics only.
    async fn subtopic_counts(
        &self,
        filter: &BankFilter,
    ) -> Result<Vec<(String, Option<String>, i64)>>;

    /// Up to `limit` distinct question ids drawn uniformly at random from
    /// one (topic, subtopic) bucket.
    async fn sample_bucket<'a>(
        &self,
        filter: &BankFilter,
        topic: &str,
        subtopic: Option<&'a str>,
        limit: i64,
    ) -> Result<Vec<i64>>;

    /// Up to `limit` distinct question ids drawn uniformly at random from
    /// the whole filtered bank, excluding `exclude`.
    async fn sample_filler(
        &self,
        filter: &BankFilter,
        exclude: &[i64],
        limit: i64,
    ) -> Result<Vec<i64>>;

    /// (topic, subtopic) per question id, for denormalization at lock time.
    async fn topic_meta(
        &self,
        ids: &[i64],
    ) -> Result<HashMap<i64, (Option<String>, Option<String>)>>;

    /// Full question records with choices, in one batch.
    async fn fetch_questions(&self, ids: &[i64]) -> Result<Vec<QuestionWithChoices>>;

    /// Correct label per question id, from the choice flagged correct.
    async fn correct_labels(&self, ids: &[i64]) -> Result<HashMap<i64, String>>;
}
