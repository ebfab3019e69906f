//! Reciprocal Rank Fusion: score = Σ 1/(k + rank)
//!
//! Merges ranked lists from search methods whose raw scores are not
//! comparable. Ranks are 1-based.

use std::collections::HashMap;

pub const DEFAULT_K: u32 = 60;

/// Fuse ranked id lists, best first.
///
/// Ties keep the order in which ids were first seen across the lists, so
/// the result is deterministic. An id repeated within one list only counts
/// at its best rank.
pub fn fuse(ranked_lists: &[Vec<String>], k: u32) -> Vec<(String, f64)> {
    let mut scores: HashMap<&str, (f64, usize)> = HashMap::new();
    let mut first_seen = 0usize;

    for list in ranked_lists {
        let mut counted: Vec<&str> = Vec::with_capacity(list.len());
        for (index, id) in list.iter().enumerate() {
            if counted.contains(&id.as_str()) {
                continue;
            }
            counted.push(id);
            let rrf = 1.0 / (f64::from(k) + (index + 1) as f64);
            let entry = scores.entry(id).or_insert_with(|| {
                first_seen += 1;
                (0.0, first_seen)
            });
            entry.0 += rrf;
        }
    }

    let mut fused: Vec<(&str, f64, usize)> = scores
        .into_iter()
        .map(|(id, (score, order))| (id, score, order))
        .collect();
    fused.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.2.cmp(&b.2)));
    fused
        .into_iter()
        .map(|(id, score, _)| (id.to_string(), score))
        .collect()
}
