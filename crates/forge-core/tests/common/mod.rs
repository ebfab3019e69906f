//! Shared fakes for pipeline tests: a scripted generative backend, an
//! in-memory candidate store, and static creator profiles.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use uuid::Uuid;

use forge_core::generation::{
    CompletionRequest, GenerativeBackend, StructuredGateway, TransportError,
};
use forge_core::packet::{PacketSynthesizer, SynthesizerConfig};
use forge_core::pipeline::PlanningPipeline;
use forge_core::profile::CreatorProfile;
use forge_core::rerank::{Reranker, RerankerConfig};
use forge_core::store::{CandidateStore, ProfileSource, StoreHit, StoredCard};

// ===========================================================================
// Scripted backend
// ===========================================================================

/// What the backend does for one call.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Fail(TransportError),
    /// Never answers; only a deadline or cancellation ends the call.
    Hang,
}

impl Reply {
    pub fn json(value: Value) -> Self {
        Self::Text(value.to_string())
    }
}

/// Answers rerank and synthesis requests from separate scripts. The last
/// reply in a script repeats once the others are used up.
#[derive(Default)]
pub struct ScriptedBackend {
    rerank: Mutex<VecDeque<Reply>>,
    synthesis: Mutex<VecDeque<Reply>>,
    rerank_calls: AtomicUsize,
    synthesis_calls: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedBackend {
    pub fn new(rerank: Vec<Reply>, synthesis: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            rerank: Mutex::new(rerank.into()),
            synthesis: Mutex::new(synthesis.into()),
            ..Self::default()
        })
    }

    pub fn rerank_calls(&self) -> usize {
        self.rerank_calls.load(Ordering::SeqCst)
    }

    pub fn synthesis_calls(&self) -> usize {
        self.synthesis_calls.load(Ordering::SeqCst)
    }

    /// User prompts of every synthesis request seen so far.
    pub fn synthesis_prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| !is_rerank(r))
            .map(|r| r.user_prompt.clone())
            .collect()
    }
}

fn is_rerank(request: &CompletionRequest) -> bool {
    request.system_prompt.starts_with("You curate")
}

fn next_reply(script: &Mutex<VecDeque<Reply>>) -> Reply {
    let mut script = script.lock().unwrap();
    if script.len() > 1 {
        script.pop_front().unwrap()
    } else {
        script
            .front()
            .cloned()
            .unwrap_or_else(|| Reply::Fail(TransportError::Network("script exhausted".to_string())))
    }
}

#[async_trait]
impl GenerativeBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = if is_rerank(request) {
            self.rerank_calls.fetch_add(1, Ordering::SeqCst);
            next_reply(&self.rerank)
        } else {
            self.synthesis_calls.fetch_add(1, Ordering::SeqCst);
            next_reply(&self.synthesis)
        };
        match reply {
            Reply::Text(text) => Ok(text),
            Reply::Fail(err) => Err(err),
            Reply::Hang => std::future::pending().await,
        }
    }
}

// ===========================================================================
// In-memory store
// ===========================================================================

#[derive(Debug, Clone)]
pub struct StoredItem {
    pub id: String,
    pub owner_id: Uuid,
    pub title: String,
    pub summary_card: Value,
    pub body: String,
}

/// Lexical search ranks by the number of query terms found in title and
/// body. Semantic search is not supported.
#[derive(Default)]
pub struct MemoryStore {
    items: Vec<StoredItem>,
    pub fail: bool,
    /// Ids `fetch_cards` pretends no longer exist.
    pub missing_cards: Vec<String>,
}

impl MemoryStore {
    pub fn new(items: Vec<StoredItem>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }
}

#[async_trait]
impl CandidateStore for MemoryStore {
    async fn lexical_search(
        &self,
        owner_id: Uuid,
        text: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<StoreHit>> {
        if self.fail {
            anyhow::bail!("connection refused");
        }
        let terms: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();
        let mut hits: Vec<(usize, &StoredItem)> = self
            .items
            .iter()
            .filter(|item| item.owner_id == owner_id)
            .map(|item| {
                let haystack = format!("{} {}", item.title, item.body).to_lowercase();
                (terms.iter().filter(|t| haystack.contains(t.as_str())).count(), item)
            })
            .filter(|(matches, _)| *matches > 0)
            .collect();
        hits.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(hits
            .into_iter()
            .take(limit)
            .map(|(matches, item)| StoreHit {
                id: item.id.clone(),
                owner_id: item.owner_id,
                title: Some(item.title.clone()),
                summary_card: item.summary_card.clone(),
                score: matches as f64,
            })
            .collect())
    }

    async fn semantic_search(
        &self,
        _owner_id: Uuid,
        _embedding: &[f32],
        _limit: usize,
    ) -> anyhow::Result<Vec<StoreHit>> {
        Ok(Vec::new())
    }

    async fn fetch_cards(&self, owner_id: Uuid, ids: &[String]) -> anyhow::Result<Vec<StoredCard>> {
        if self.fail {
            anyhow::bail!("connection refused");
        }
        Ok(self
            .items
            .iter()
            .filter(|item| item.owner_id == owner_id && ids.contains(&item.id))
            .filter(|item| !self.missing_cards.contains(&item.id))
            .map(|item| StoredCard {
                id: item.id.clone(),
                owner_id: item.owner_id,
                title: Some(item.title.clone()),
                summary_card: json!({ "full": true, "summary": item.summary_card.clone() }),
            })
            .collect())
    }
}

/// `count` yoga videos owned by `owner`, ids `v000`, `v001`, ...
pub fn yoga_library(owner: Uuid, count: usize) -> Vec<StoredItem> {
    (0..count)
        .map(|i| StoredItem {
            id: format!("v{i:03}"),
            owner_id: owner,
            title: format!("Beginner yoga routine part {i}"),
            summary_card: json!(format!("Lesson {i}: gentle poses for beginners")),
            body: "breathe and stretch through a beginner yoga routine".to_string(),
        })
        .collect()
}

// ===========================================================================
// Profiles
// ===========================================================================

#[derive(Default)]
pub struct StaticProfiles {
    pub profiles: HashMap<Uuid, CreatorProfile>,
    pub fail: bool,
}

#[async_trait]
impl ProfileSource for StaticProfiles {
    async fn creator_profile(&self, owner_id: Uuid) -> anyhow::Result<CreatorProfile> {
        if self.fail {
            anyhow::bail!("profile service down");
        }
        Ok(self
            .profiles
            .get(&owner_id)
            .cloned()
            .unwrap_or_else(|| CreatorProfile::with_defaults("creator")))
    }
}

// ===========================================================================
// Assembly
// ===========================================================================

pub fn gateway(backend: Arc<ScriptedBackend>, deadline: Duration) -> StructuredGateway {
    StructuredGateway::new(backend, "test-model", deadline)
}

/// A pipeline wired to real reranker and synthesizer stages over `backend`.
pub fn pipeline(
    store: MemoryStore,
    profiles: StaticProfiles,
    backend: Arc<ScriptedBackend>,
    deadline: Duration,
) -> PlanningPipeline {
    let store = Arc::new(store);
    PlanningPipeline::new(
        store,
        Arc::new(profiles),
        Arc::new(Reranker::new(
            gateway(backend.clone(), deadline),
            RerankerConfig::default(),
        )),
        Arc::new(PacketSynthesizer::new(
            gateway(backend, deadline),
            SynthesizerConfig::default(),
        )),
    )
}

pub fn rerank_reply(ids: &[&str], confidence: &str, gaps: &[&str]) -> Reply {
    let selected: Vec<Value> = ids
        .iter()
        .map(|id| json!({ "id": id, "reason": format!("covers {id}") }))
        .collect();
    Reply::json(json!({
        "selected": selected,
        "confidence": confidence,
        "coverage_gaps": gaps,
    }))
}

pub fn course_packet() -> Value {
    json!({
        "title": "Yoga From Zero",
        "promise": "A calm ten minute practice in three weeks",
        "audience": "complete beginners",
        "modules": [
            { "title": "Week 1", "lessons": ["Breath", "Cat-cow"], "source_ids": ["v000"] },
            { "title": "Week 2", "lessons": ["Sun salutation"] }
        ]
    })
}
