use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One row of a ranked search over `content_items`.
///
/// `score` is method-specific: `ts_rank` for lexical matches, cosine
/// similarity for semantic matches. Scores from different methods are not
/// comparable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ContentHit {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: Option<String>,
    pub summary_card: serde_json::Value,
    pub score: f64,
}

/// Title and full summary card of a content item, without ranking data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ContentCard {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: Option<String>,
    pub summary_card: serde_json::Value,
}

/// A creator's stored profile settings.
///
/// `voice` and `visual` are free-form JSON objects; absent keys are filled
/// with defaults by the consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CreatorProfileRow {
    pub owner_id: Uuid,
    pub handle: String,
    pub display_name: Option<String>,
    pub voice: serde_json::Value,
    pub visual: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}
