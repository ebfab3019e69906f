//! Postgres-backed [`CandidateStore`] and [`ProfileSource`].

use async_trait::async_trait;
use forge_db::models::{ContentCard, ContentHit};
use forge_db::queries::{content, profiles};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::{CandidateStore, ProfileSource, StoreHit, StoredCard};
use crate::profile::{CreatorProfile, DEFAULT_HANDLE};

/// Content and profile queries over a shared connection pool.
#[derive(Debug, Clone)]
pub struct PgContentStore {
    pool: PgPool,
}

impl PgContentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

impl From<ContentHit> for StoreHit {
    fn from(hit: ContentHit) -> Self {
        Self {
            id: hit.id.to_string(),
            owner_id: hit.owner_id,
            title: hit.title,
            summary_card: hit.summary_card,
            score: hit.score,
        }
    }
}

impl From<ContentCard> for StoredCard {
    fn from(card: ContentCard) -> Self {
        Self {
            id: card.id.to_string(),
            owner_id: card.owner_id,
            title: card.title,
            summary_card: card.summary_card,
        }
    }
}

#[async_trait]
impl CandidateStore for PgContentStore {
    async fn lexical_search(
        &self,
        owner_id: Uuid,
        text: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<StoreHit>> {
        let hits = content::lexical_search(&self.pool, owner_id, text, limit_param(limit)).await?;
        Ok(hits.into_iter().map(StoreHit::from).collect())
    }

    async fn semantic_search(
        &self,
        owner_id: Uuid,
        embedding: &[f32],
        limit: usize,
    ) -> anyhow::Result<Vec<StoreHit>> {
        let hits =
            content::semantic_search(&self.pool, owner_id, embedding, limit_param(limit)).await?;
        Ok(hits.into_iter().map(StoreHit::from).collect())
    }

    async fn fetch_cards(&self, owner_id: Uuid, ids: &[String]) -> anyhow::Result<Vec<StoredCard>> {
        let uuids: Vec<Uuid> = ids
            .iter()
            .filter_map(|id| match Uuid::parse_str(id) {
                Ok(uuid) => Some(uuid),
                Err(_) => {
                    debug!(id = %id, "skipping non-uuid content id");
                    None
                }
            })
            .collect();
        let cards = content::fetch_cards(&self.pool, owner_id, &uuids).await?;
        Ok(cards.into_iter().map(StoredCard::from).collect())
    }
}

#[async_trait]
impl ProfileSource for PgContentStore {
    async fn creator_profile(&self, owner_id: Uuid) -> anyhow::Result<CreatorProfile> {
        let profile = match profiles::get_profile(&self.pool, owner_id).await? {
            Some(row) => CreatorProfile::from_settings(
                &row.handle,
                row.display_name.as_deref(),
                &row.voice,
                &row.visual,
            ),
            None => {
                debug!(%owner_id, "no saved creator profile, using defaults");
                CreatorProfile::with_defaults(DEFAULT_HANDLE)
            }
        };
        Ok(profile)
    }
}
