//! Query interfaces the pipeline consumes: the candidate store and the
//! creator profile lookup.
//!
//! Both are traits so the pipeline runs unchanged against Postgres in
//! production and in-memory fakes in tests.

pub mod postgres;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::profile::CreatorProfile;

pub use postgres::PgContentStore;

/// One ranked hit from a single search method.
///
/// Hits carry their `owner_id` so callers can re-check scoping.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreHit {
    pub id: String,
    pub owner_id: Uuid,
    pub title: Option<String>,
    pub summary_card: Value,
    pub score: f64,
}

/// Full card of a content item.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredCard {
    pub id: String,
    pub owner_id: Uuid,
    pub title: Option<String>,
    pub summary_card: Value,
}

/// Read-only access to a creator's indexed content.
///
/// Every method filters on `owner_id`. Results come back best first.
#[async_trait]
pub trait CandidateStore: Send + Sync {
    async fn lexical_search(
        &self,
        owner_id: Uuid,
        text: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<StoreHit>>;

    async fn semantic_search(
        &self,
        owner_id: Uuid,
        embedding: &[f32],
        limit: usize,
    ) -> anyhow::Result<Vec<StoreHit>>;

    /// Cards for `ids`, in no particular order. Unknown ids are skipped.
    async fn fetch_cards(&self, owner_id: Uuid, ids: &[String]) -> anyhow::Result<Vec<StoredCard>>;
}

/// Creator profile lookup. Implementations fill defaults for anything
/// unconfigured rather than failing.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn creator_profile(&self, owner_id: Uuid) -> anyhow::Result<CreatorProfile>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn CandidateStore, _: &dyn ProfileSource) {}
};
