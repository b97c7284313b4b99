//! Builds the locked, ordered question set for one attempt: stratified
//! draws per (topic, subtopic) bucket, reconciliation to the exact count,
//! and a final independent shuffle for serving order.

use std::collections::{HashMap, HashSet};

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{Error, Result};
use crate::models::attempt::LockedQuestion;
use crate::services::question_bank::{BankFilter, QuestionBank};
use crate::services::quota;

/// Draws exactly `question_count` distinct question ids from the bank,
/// balanced across topic/subtopic strata, and returns them with 1-based
/// positions in final (shuffled) serving order.
///
/// Side-effect free: nothing is persisted here, so a failed assembly can be
/// retried without cleanup.
pub async fn assemble_locked_set(
    bank: &dyn QuestionBank,
    filter: &BankFilter,
    question_count: usize,
    rng: &mut (impl Rng + Send),
) -> Result<Vec<LockedQuestion>> {
    let topic_counts: HashMap<String, i64> =
        bank.topic_counts(filter).await?.into_iter().collect();
    if topic_counts.is_empty() {
        return Err(Error::BadRequest(
            "No questions match the selected exam/topic filters".to_string(),
        ));
    }

    let topic_quotas = quota::allocate(&topic_counts, question_count as i64);

    let subtopic_counts: HashMap<(String, Option<String>), i64> = bank
        .subtopic_counts(filter)
        .await?
        .into_iter()
        .map(|(topic, subtopic, count)| ((topic, subtopic), count))
        .collect();
    let bucket_quotas = quota::allocate_subtopics(&subtopic_counts, &topic_quotas);

    // Buckets are visited in a fixed order; only the bank's draws and the
    // shuffles below are random.
    let mut buckets: Vec<(&(String, Option<String>), &i64)> = bucket_quotas.iter().collect();
    buckets.sort_by(|a, b| a.0.cmp(b.0));

    let mut picked: Vec<i64> = Vec::with_capacity(question_count);
    for ((topic, subtopic), &bucket_quota) in buckets {
        if bucket_quota <= 0 {
            continue;
        }
        let ids = bank
            .sample_bucket(filter, topic, subtopic.as_deref(), bucket_quota)
            .await?;
        picked.extend(ids);
    }

    let mut picked = stable_unique(picked);

    if picked.len() < question_count {
        let missing = (question_count - picked.len()) as i64;
        let filler = bank.sample_filler(filter, &picked, missing).await?;
        picked.extend(filler);
    }

    if picked.len() > question_count {
        picked.shuffle(rng);
        picked.truncate(question_count);
    }

    if picked.len() != question_count {
        return Err(Error::BadRequest(format!(
            "Unable to assemble {} questions (got {})",
            question_count,
            picked.len()
        )));
    }

    let meta = bank.topic_meta(&picked).await?;

    // Second, independent shuffle: serving order must not correlate with
    // bucket draw order.
    picked.shuffle(rng);

    Ok(picked
        .into_iter()
        .enumerate()
        .map(|(index, question_id)| {
            let (topic, subtopic) = meta.get(&question_id).cloned().unwrap_or((None, None));
            LockedQuestion {
                question_id,
                position: (index + 1) as i32,
                topic,
                subtopic,
            }
        })
        .collect())
}

/// First-seen-order deduplication.
fn stable_unique(ids: Vec<i64>) -> Vec<i64> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}
