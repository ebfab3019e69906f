//! End-to-end planning against a real PostgreSQL content store.
//!
//! The generative backend is scripted; everything else (full-text search,
//! owner scoping, card lookup, profile loading) runs against a temporary
//! database from `forge-test-utils`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use forge_core::generation::{
    CompletionRequest, GenerativeBackend, StructuredGateway, TransportError,
};
use forge_core::packet::{PacketSynthesizer, ProductType, SynthesizerConfig};
use forge_core::pipeline::{PipelineOutcome, PlanRequest, PlanningPipeline, RejectReason};
use forge_core::rerank::{Confidence, Reranker, RerankerConfig};
use forge_core::store::PgContentStore;
use forge_db::queries::content::{self, NewContentItem};
use forge_db::queries::profiles::{self, NewCreatorProfile};
use forge_test_utils::{create_test_db, drop_test_db};

// ===========================================================================
// Scripted backend
// ===========================================================================

/// Answers rerank prompts and synthesis prompts with fixed replies and
/// records every request.
struct ScriptedBackend {
    rerank_reply: String,
    synthesis_reply: String,
    requests: Mutex<Vec<CompletionRequest>>,
}

#[async_trait]
impl GenerativeBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        if request.system_prompt.starts_with("You curate") {
            Ok(self.rerank_reply.clone())
        } else {
            Ok(self.synthesis_reply.clone())
        }
    }
}

// ===========================================================================
// Helpers
// ===========================================================================

async fn seed(pool: &PgPool, owner_id: Uuid, title: &str, summary: &str) -> Uuid {
    let card = json!({ "summary": summary });
    content::insert_content_item(
        pool,
        &NewContentItem {
            owner_id,
            title: Some(title),
            summary_card: &card,
            body_text: summary,
            embedding: None,
        },
    )
    .await
    .expect("insert content item")
}

fn pipeline(pool: PgPool, backend: Arc<ScriptedBackend>) -> PlanningPipeline {
    let gateway = StructuredGateway::new(backend, "test-model", Duration::from_secs(5));
    let store = Arc::new(PgContentStore::new(pool));
    PlanningPipeline::new(
        store.clone(),
        store,
        Arc::new(Reranker::new(gateway.clone(), RerankerConfig::default())),
        Arc::new(PacketSynthesizer::new(gateway, SynthesizerConfig::default())),
    )
}

fn course_reply() -> String {
    json!({
        "title": "Yoga From Zero",
        "promise": "A calm ten minute morning practice",
        "audience": "beginners",
        "modules": [{ "title": "Breath", "lessons": ["Box breathing"] }]
    })
    .to_string()
}

fn request(owner_id: Uuid, brief: &str) -> PlanRequest {
    PlanRequest {
        owner_id,
        product_type: ProductType::Course,
        brief: brief.to_string(),
        audience: None,
        tone: None,
        mood: None,
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[tokio::test]
async fn plans_course_from_stored_content() {
    let (pool, db_name) = create_test_db().await;
    let owner = Uuid::new_v4();
    let breath = seed(&pool, owner, "Morning breath", "yoga breathing for beginners").await;
    let flow = seed(&pool, owner, "Gentle flow", "a gentle beginner yoga flow").await;
    seed(&pool, Uuid::new_v4(), "Other creator", "beginner yoga from someone else").await;

    let voice = json!({ "tone": "playful and warm" });
    profiles::upsert_profile(
        &pool,
        &NewCreatorProfile {
            owner_id: owner,
            handle: "yogasam",
            display_name: Some("Sam Rivera"),
            voice: &voice,
            visual: &json!({}),
        },
    )
    .await
    .unwrap();

    let backend = Arc::new(ScriptedBackend {
        rerank_reply: json!({
            "selected": [
                { "id": flow.to_string(), "reason": "core flow" },
                { "id": breath.to_string(), "reason": "warm-up" }
            ],
            "confidence": "high",
            "coverage_gaps": ["meditation"]
        })
        .to_string(),
        synthesis_reply: course_reply(),
        requests: Mutex::new(Vec::new()),
    });
    let pipeline = pipeline(pool.clone(), backend.clone());

    let outcome = pipeline
        .plan_product(&request(owner, "beginner yoga course"), &CancellationToken::new())
        .await
        .unwrap();

    match outcome {
        PipelineOutcome::Success {
            build_packet,
            confidence,
            coverage_gaps,
            videos_used,
            total_candidates,
        } => {
            assert_eq!(build_packet.title(), Some("Yoga From Zero"));
            assert_eq!(confidence, Confidence::High);
            assert_eq!(coverage_gaps, vec!["meditation".to_string()]);
            assert_eq!(videos_used, vec![flow.to_string(), breath.to_string()]);
            assert_eq!(total_candidates, 2, "other creator's content must not be retrieved");
        }
        other => panic!("expected success, got {other:?}"),
    }

    let requests = backend.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    let synthesis = &requests[1];
    assert!(synthesis.system_prompt.contains("Sam Rivera"));
    assert!(synthesis.user_prompt.contains("playful and warm"));
    let flow_at = synthesis.user_prompt.find(&flow.to_string()).unwrap();
    let breath_at = synthesis.user_prompt.find(&breath.to_string()).unwrap();
    assert!(flow_at < breath_at, "content must keep reranker order");

    drop(requests);
    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn empty_library_is_rejected_without_model_calls() {
    let (pool, db_name) = create_test_db().await;
    let owner = Uuid::new_v4();
    seed(&pool, Uuid::new_v4(), "Not yours", "beginner yoga").await;

    let backend = Arc::new(ScriptedBackend {
        rerank_reply: String::new(),
        synthesis_reply: String::new(),
        requests: Mutex::new(Vec::new()),
    });
    let pipeline = pipeline(pool.clone(), backend.clone());

    let outcome = pipeline
        .plan_product(&request(owner, "beginner yoga"), &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        PipelineOutcome::Rejected {
            reason: RejectReason::NoContent,
            ..
        }
    ));
    assert!(backend.requests.lock().unwrap().is_empty());

    pool.close().await;
    drop_test_db(&db_name).await;
}
