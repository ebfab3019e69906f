//! Database query functions for the `content_items` table.
//!
//! Every read takes an `owner_id` and filters on it in SQL. Callers must not
//! rely on ranking to keep another creator's content out of a result set.

use anyhow::{Context, Result, bail};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{ContentCard, ContentHit};

/// Maximum number of distinct terms sent to `to_tsquery`.
const MAX_QUERY_TERMS: usize = 32;

/// Fields for inserting a content item.
#[derive(Debug, Clone)]
pub struct NewContentItem<'a> {
    pub owner_id: Uuid,
    pub title: Option<&'a str>,
    pub summary_card: &'a serde_json::Value,
    pub body_text: &'a str,
    pub embedding: Option<&'a [f32]>,
}

/// Turn a free-text brief into an OR-of-terms `tsquery` string.
///
/// Only alphanumeric runs survive, so the result is always valid
/// `to_tsquery` input. Returns `None` when the text has no usable terms.
pub fn build_tsquery(text: &str) -> Option<String> {
    let mut terms: Vec<String> = Vec::new();
    for raw in text.split(|c: char| !c.is_alphanumeric()) {
        if raw.chars().count() < 2 {
            continue;
        }
        let term = raw.to_lowercase();
        if !terms.contains(&term) {
            terms.push(term);
        }
        if terms.len() == MAX_QUERY_TERMS {
            break;
        }
    }
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" | "))
    }
}

/// Render an embedding as a pgvector text literal (`[0.1,0.2,...]`).
pub fn vector_literal(embedding: &[f32]) -> Result<String> {
    if embedding.is_empty() {
        bail!("embedding is empty");
    }
    if embedding.iter().any(|v| !v.is_finite()) {
        bail!("embedding contains non-finite values");
    }
    let parts: Vec<String> = embedding.iter().map(|v| v.to_string()).collect();
    Ok(format!("[{}]", parts.join(",")))
}

/// Insert a content item and return its id.
pub async fn insert_content_item(pool: &PgPool, item: &NewContentItem<'_>) -> Result<Uuid> {
    let embedding = item.embedding.map(vector_literal).transpose()?;

    let id: Uuid = sqlx::query_scalar(
        "INSERT INTO content_items (owner_id, title, summary_card, body_text, embedding) \
         VALUES ($1, $2, $3, $4, $5::vector) \
         RETURNING id",
    )
    .bind(item.owner_id)
    .bind(item.title)
    .bind(item.summary_card)
    .bind(item.body_text)
    .bind(embedding)
    .fetch_one(pool)
    .await
    .context("failed to insert content item")?;

    Ok(id)
}

/// Full-text search over one owner's content, best `ts_rank` first.
pub async fn lexical_search(
    pool: &PgPool,
    owner_id: Uuid,
    text: &str,
    limit: i64,
) -> Result<Vec<ContentHit>> {
    let Some(tsquery) = build_tsquery(text) else {
        return Ok(Vec::new());
    };

    let hits = sqlx::query_as::<_, ContentHit>(
        "SELECT id, owner_id, title, summary_card, \
                ts_rank(search_tsv, to_tsquery('english', $2))::float8 AS score \
         FROM content_items \
         WHERE owner_id = $1 \
           AND search_tsv @@ to_tsquery('english', $2) \
         ORDER BY score DESC, created_at DESC \
         LIMIT $3",
    )
    .bind(owner_id)
    .bind(&tsquery)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to run lexical content search")?;

    Ok(hits)
}

/// Nearest-neighbour search by cosine distance over one owner's embeddings.
///
/// Items without an embedding, or whose dimension differs from the query,
/// are skipped.
pub async fn semantic_search(
    pool: &PgPool,
    owner_id: Uuid,
    embedding: &[f32],
    limit: i64,
) -> Result<Vec<ContentHit>> {
    let literal = vector_literal(embedding)?;

    let hits = sqlx::query_as::<_, ContentHit>(
        "SELECT id, owner_id, title, summary_card, \
                (1 - (embedding <=> $2::vector))::float8 AS score \
         FROM content_items \
         WHERE owner_id = $1 \
           AND embedding IS NOT NULL \
           AND vector_dims(embedding) = vector_dims($2::vector) \
         ORDER BY embedding <=> $2::vector \
         LIMIT $3",
    )
    .bind(owner_id)
    .bind(&literal)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to run semantic content search")?;

    Ok(hits)
}

/// Fetch the cards for `ids` that belong to `owner_id`.
///
/// Rows come back in no particular order; ids owned by someone else or
/// missing entirely are silently absent.
pub async fn fetch_cards(pool: &PgPool, owner_id: Uuid, ids: &[Uuid]) -> Result<Vec<ContentCard>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let cards = sqlx::query_as::<_, ContentCard>(
        "SELECT id, owner_id, title, summary_card \
         FROM content_items \
         WHERE owner_id = $1 AND id = ANY($2)",
    )
    .bind(owner_id)
    .bind(ids)
    .fetch_all(pool)
    .await
    .context("failed to fetch content cards")?;

    Ok(cards)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tsquery_joins_terms_with_or() {
        assert_eq!(
            build_tsquery("Beginner yoga routine").as_deref(),
            Some("beginner | yoga | routine")
        );
    }

    #[test]
    fn tsquery_strips_operators_and_dedupes() {
        assert_eq!(
            build_tsquery("yoga & (stretch) | YOGA! 'a' <-> flow:*").as_deref(),
            Some("yoga | stretch | flow")
        );
    }

    #[test]
    fn tsquery_none_for_punctuation_only() {
        assert_eq!(build_tsquery("?! - a"), None);
        assert_eq!(build_tsquery(""), None);
    }

    #[test]
    fn tsquery_caps_term_count() {
        let text: Vec<String> = (0..100).map(|i| format!("term{i}")).collect();
        let query = build_tsquery(&text.join(" ")).unwrap();
        assert_eq!(query.split(" | ").count(), MAX_QUERY_TERMS);
    }

    #[test]
    fn vector_literal_formats() {
        assert_eq!(vector_literal(&[0.5, -1.0, 2.25]).unwrap(), "[0.5,-1,2.25]");
    }

    #[test]
    fn vector_literal_rejects_bad_input() {
        assert!(vector_literal(&[]).is_err());
        assert!(vector_literal(&[0.1, f32::NAN]).is_err());
    }
}
