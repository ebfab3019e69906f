//! Hybrid retrieval over one creator's content.
//!
//! ```text
//!   query text ──▶ lexical_search ─────────────┐
//!        │                                     ├──▶ owner check ──▶ RRF ──▶ top `limit`
//!        └──▶ Embedder ──▶ semantic_search ────┘
//!               (failure: lexical only)
//! ```

pub mod embed;
pub mod fusion;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::candidate::ContentCandidate;
use crate::store::{CandidateStore, StoreHit};

pub use embed::{Embedder, HttpEmbedder};

/// Runs lexical and semantic searches and fuses the rankings.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn CandidateStore>,
    embedder: Option<Arc<dyn Embedder>>,
    rrf_k: u32,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("embedder", &self.embedder.as_ref().map(|e| e.name().to_string()))
            .field("rrf_k", &self.rrf_k)
            .finish()
    }
}

impl Retriever {
    /// Lexical-only retriever.
    pub fn new(store: Arc<dyn CandidateStore>) -> Self {
        Self {
            store,
            embedder: None,
            rrf_k: fusion::DEFAULT_K,
        }
    }

    /// Add semantic search through `embedder`.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_rrf_k(mut self, k: u32) -> Self {
        self.rrf_k = k;
        self
    }

    /// Up to `limit` candidates owned by `owner_id`, best first.
    ///
    /// No content is an empty list, not an error. Store failures propagate;
    /// an embedder failure only drops the semantic half.
    pub async fn retrieve(
        &self,
        owner_id: Uuid,
        query_text: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<ContentCandidate>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let lexical = self.store.lexical_search(owner_id, query_text, limit).await?;
        let semantic = match &self.embedder {
            Some(embedder) => match embedder.embed(query_text).await {
                Ok(vector) => self.store.semantic_search(owner_id, &vector, limit).await?,
                Err(err) => {
                    warn!(
                        %owner_id,
                        embedder = embedder.name(),
                        error = %err,
                        "query embedding failed, falling back to lexical retrieval"
                    );
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let lexical = owned_hits(owner_id, lexical);
        let semantic = owned_hits(owner_id, semantic);
        debug!(lexical = lexical.len(), semantic = semantic.len(), "search hits");

        let ranked: Vec<Vec<String>> = [&lexical, &semantic]
            .iter()
            .map(|hits| hits.iter().map(|h| h.id.clone()).collect())
            .collect();

        let mut by_id: HashMap<String, StoreHit> = HashMap::new();
        for hit in lexical.into_iter().chain(semantic) {
            by_id.entry(hit.id.clone()).or_insert(hit);
        }

        let candidates: Vec<ContentCandidate> = fusion::fuse(&ranked, self.rrf_k)
            .into_iter()
            .take(limit)
            .filter_map(|(id, score)| {
                by_id.remove(&id).map(|hit| ContentCandidate {
                    id,
                    title: hit.title,
                    summary_card: hit.summary_card,
                    relevance_score: score,
                })
            })
            .collect();

        info!(%owner_id, candidates = candidates.len(), "retrieval complete");
        Ok(candidates)
    }
}

/// Drop hits that belong to another owner. The store filters on owner
/// already; this re-check keeps a faulty store from leaking content.
fn owned_hits(owner_id: Uuid, hits: Vec<StoreHit>) -> Vec<StoreHit> {
    hits.into_iter()
        .filter(|hit| {
            let owned = hit.owner_id == owner_id;
            if !owned {
                warn!(
                    %owner_id,
                    hit_owner = %hit.owner_id,
                    content_id = %hit.id,
                    "dropping content hit owned by another creator"
                );
            }
            owned
        })
        .collect()
}
