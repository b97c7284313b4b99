//! Stratified quota allocation: proportional integer shares per stratum with
//! a deterministic drift-repair pass.

use std::collections::HashMap;
use std::hash::Hash;

/// Computes per-stratum quotas that sum to `total` whenever `total` is at
/// least the number of strata. Every stratum with a positive population gets
/// at least 1.
///
/// Initial shares are `max(1, round(total * pop / total_pop))`; the repair
/// pass then cycles over strata in descending population order (ties broken
/// by ascending key), incrementing while the sum is short and decrementing
/// (never below 1) while it is long. When every stratum is already pinned at
/// 1 and the sum is still long, the pass stops and the result over-allocates;
/// the assembler trims the flat list back to the exact count.
pub fn allocate<K>(populations: &HashMap<K, i64>, total: i64) -> HashMap<K, i64>
where
    K: Clone + Eq + Hash + Ord,
{
    if populations.is_empty() {
        return HashMap::new();
    }

    let total_population: i64 = populations.values().sum();
    if total_population <= 0 {
        return populations.keys().map(|k| (k.clone(), 0)).collect();
    }

    let mut quotas: HashMap<K, i64> = populations
        .iter()
        .map(|(key, &count)| {
            let share =
                (total as f64 * count as f64 / total_population as f64).round() as i64;
            (key.clone(), share.max(1))
        })
        .collect();

    let mut order: Vec<&K> = populations.keys().collect();
    order.sort_by(|a, b| {
        populations[*b]
            .cmp(&populations[*a])
            .then_with(|| a.cmp(b))
    });

    let mut drift = total - quotas.values().sum::<i64>();
    let mut idle_steps = 0usize;
    let mut i = 0usize;
    while drift != 0 && idle_steps < order.len() {
        let key = order[i % order.len()];
        if let Some(quota) = quotas.get_mut(key) {
            if drift > 0 {
                *quota += 1;
                drift -= 1;
                idle_steps = 0;
            } else if *quota > 1 {
                *quota -= 1;
                drift += 1;
                idle_steps = 0;
            } else {
                idle_steps += 1;
            }
        }
        i += 1;
    }

    quotas
}

/// Splits each topic's quota across that topic's subtopics with the same
/// allocation and repair rules. The NULL subtopic is a stratum of its own.
/// Subtopic rows whose topic has no quota contribute nothing.
pub fn allocate_subtopics(
    subtopic_populations: &HashMap<(String, Option<String>), i64>,
    topic_quotas: &HashMap<String, i64>,
) -> HashMap<(String, Option<String>), i64> {
    let mut by_topic: HashMap<&str, HashMap<Option<String>, i64>> = HashMap::new();
    for ((topic, subtopic), &count) in subtopic_populations {
        by_topic
            .entry(topic.as_str())
            .or_default()
            .insert(subtopic.clone(), count);
    }

    let mut quotas = HashMap::new();
    for (topic, &topic_quota) in topic_quotas {
        let Some(subs) = by_topic.get(topic.as_str()) else {
            continue;
        };
        for (subtopic, quota) in allocate(subs, topic_quota) {
            quotas.insert((topic.clone(), subtopic), quota);
        }
    }
    quotas
}
