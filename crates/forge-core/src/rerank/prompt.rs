//! Rerank prompt construction.

use crate::candidate::{ContentCandidate, render_card, truncate_chars};
use crate::packet::ProductType;

pub const SYSTEM_PROMPT: &str = "\
You curate a creator's existing content for a new digital product.
Given a product brief and a list of candidate content items, pick the items that best support the product and order them by how central they are to it.
Judge both relevance to the brief and narrative coverage: together the selection should cover what the product promises.

Respond with a single JSON object and nothing else:
{\"selected\": [{\"id\": \"<candidate id>\", \"reason\": \"<one sentence>\"}], \"confidence\": \"high\" | \"medium\" | \"low\", \"coverage_gaps\": [\"<topic the content does not cover>\"]}

Rules:
- Only use ids from the candidate list, copied exactly.
- Use \"low\" confidence when the content cannot credibly support the product. An empty selection is allowed only with \"low\".
- List coverage gaps even when confidence is high.";

/// Build the user prompt. Candidates keep retrieval order and their cards
/// are cut to `card_chars` characters.
pub fn build_user_prompt(
    candidates: &[ContentCandidate],
    brief: &str,
    product_type: ProductType,
    card_chars: usize,
    max_selected: usize,
) -> String {
    let mut out = format!(
        "Product type: {}\nBrief: {}\nSelect at most {max_selected} items.\n\nCandidates ({}):\n\n",
        product_type.label(),
        brief.trim(),
        candidates.len(),
    );
    for candidate in candidates {
        out.push_str(&format!(
            "id: {}\ntitle: {}\n{}\n\n",
            candidate.id,
            candidate.title.as_deref().unwrap_or("(untitled)"),
            truncate_chars(&render_card(&candidate.summary_card), card_chars),
        ));
    }
    out
}
