//! `forge plan`: run one planning invocation and print the outcome.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use forge_core::generation::{GenerativeBackend, OpenAiBackend, StructuredGateway};
use forge_core::packet::{PacketSynthesizer, ProductType, SynthesizerConfig};
use forge_core::pipeline::{PipelineConfig, PlanRequest, PlanningPipeline, Retrying};
use forge_core::rerank::{Reranker, RerankerConfig};
use forge_core::retrieval::HttpEmbedder;
use forge_core::store::PgContentStore;

use crate::config::ForgeConfig;

/// Wire the production pipeline: Postgres store and profiles, an
/// OpenAI-compatible backend for both generative stages, optional
/// embeddings, and the configured retry policy around each stage.
pub fn build_pipeline(config: &ForgeConfig, pool: PgPool) -> PlanningPipeline {
    let llm = &config.llm;
    let backend: Arc<dyn GenerativeBackend> =
        Arc::new(OpenAiBackend::new(&llm.base_url, llm.api_key.clone()));
    let policy = config.retry.policy();

    let reranker = Reranker::new(
        StructuredGateway::new(backend.clone(), llm.rerank_model(), llm.rerank_timeout()),
        RerankerConfig {
            max_selected: config.pipeline.max_selected,
            card_chars: config.pipeline.card_chars,
            max_tokens: config.pipeline.rerank_max_tokens,
            reasoning: llm.rerank_reasoning,
        },
    );
    let synthesizer = PacketSynthesizer::new(
        StructuredGateway::new(backend, &llm.model, llm.synthesis_timeout()),
        SynthesizerConfig {
            max_tokens: config.pipeline.synthesis_max_tokens,
            reasoning: llm.synthesis_reasoning,
        },
    );

    let store = Arc::new(PgContentStore::new(pool));
    let mut pipeline = PlanningPipeline::new(
        store.clone(),
        store,
        Arc::new(Retrying::new(reranker, policy.clone())),
        Arc::new(Retrying::new(synthesizer, policy)),
    )
    .with_config(PipelineConfig {
        retrieval_limit: config.pipeline.retrieval_limit,
    });

    if let Some(model) = &llm.embedding_model {
        debug!(model = %model, "semantic retrieval enabled");
        pipeline = pipeline.with_embedder(Arc::new(HttpEmbedder::new(
            &llm.base_url,
            llm.api_key.clone(),
            model,
        )));
    }
    pipeline
}

/// Arguments of `forge plan`.
#[derive(Debug, Clone)]
pub struct PlanArgs {
    pub owner: String,
    pub product_type: String,
    pub brief: String,
    pub audience: Option<String>,
    pub tone: Option<String>,
    pub mood: Option<String>,
}

impl PlanArgs {
    fn into_request(self) -> Result<PlanRequest> {
        let owner_id = Uuid::parse_str(&self.owner)
            .with_context(|| format!("invalid owner ID: {}", self.owner))?;
        let product_type: ProductType = self.product_type.parse()?;
        Ok(PlanRequest {
            owner_id,
            product_type,
            brief: self.brief,
            audience: self.audience,
            tone: self.tone,
            mood: self.mood,
        })
    }
}

/// Run the pipeline and print the outcome as pretty JSON.
///
/// Returns whether the outcome was a success. Ctrl+C cancels the run.
pub async fn run_plan(pipeline: &PlanningPipeline, args: PlanArgs) -> Result<bool> {
    let request = args.into_request()?;

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, cancelling plan");
                cancel.cancel();
            }
        })
    };

    let result = pipeline.plan_product(&request, &cancel).await;
    watcher.abort();

    let outcome = result.context("planning failed")?;
    let rendered = serde_json::to_string_pretty(&outcome).context("failed to render outcome")?;
    println!("{rendered}");
    Ok(outcome.is_success())
}
