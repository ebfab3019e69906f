//! Content items as they move through the pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A retrieval hit. Produced by the retriever and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentCandidate {
    /// Opaque, stable identifier of the content item.
    pub id: String,
    pub title: Option<String>,
    /// Structured or free-text digest of the item.
    pub summary_card: Value,
    /// Retrieval-stage ranking signal. Not consulted after reranking.
    pub relevance_score: f64,
}

/// A reranker-selected item enriched with its full summary card, in
/// reranker order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedContent {
    pub candidate_id: String,
    pub title: Option<String>,
    /// Why the reranker picked this item.
    pub reason: String,
    pub summary_card: Value,
}

/// Render a summary card as prompt text.
///
/// Strings pass through; objects become `key: value` lines with list values
/// joined by `; `; anything else is compact JSON.
pub fn render_card(card: &Value) -> String {
    match card {
        Value::Null => String::new(),
        Value::String(text) => text.trim().to_string(),
        Value::Object(fields) => fields
            .iter()
            .filter_map(|(key, value)| {
                let rendered = render_scalar_or_list(value);
                (!rendered.is_empty()).then(|| format!("{key}: {rendered}"))
            })
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

fn render_scalar_or_list(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .map(render_scalar_or_list)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

/// Truncate to at most `max_chars` characters, marking the cut with `…`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}
