//! The content-to-product planning pipeline.
//!
//! ```text
//! PlanRequest
//!     │
//!     ▼
//! Retriever ──(0 candidates)──────────────▶ Rejected { no_content }
//!     │
//!     ▼
//! Rerank ─────(GenerationFailure)─────────▶ Rejected { generation_failed }
//!     │  ────(confidence low)─────────────▶ Rejected { low_confidence }
//!     ▼
//! fetch_cards + creator_profile
//!     │
//!     ▼
//! Synthesize ─(GenerationFailure)─────────▶ Rejected { generation_failed }
//!     │
//!     ▼
//! Success { build_packet, videos_used, ... }
//! ```
//!
//! Stages run strictly in sequence. Every await is raced against the
//! caller's [`CancellationToken`]; on cancellation the in-flight call is
//! dropped and nothing partial is returned.

pub mod retry;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::candidate::{ContentCandidate, SelectedContent};
use crate::generation::{FailureClass, GenerationFailure};
use crate::packet::{BuildPacket, ProductType, SynthesisInput, Synthesize};
use crate::rerank::{Confidence, Rerank, SelectedItem};
use crate::retrieval::{Embedder, Retriever};
use crate::store::{CandidateStore, ProfileSource};

pub use retry::{RetryPolicy, Retrying};

// ---------------------------------------------------------------------------
// Request / outcome
// ---------------------------------------------------------------------------

/// One planning request from an authenticated, entitled caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub owner_id: Uuid,
    pub product_type: ProductType,
    pub brief: String,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub mood: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NoContent,
    LowConfidence,
    GenerationFailed,
}

impl RejectReason {
    pub fn code(self) -> &'static str {
        match self {
            Self::NoContent => "no_content",
            Self::LowConfidence => "low_confidence",
            Self::GenerationFailed => "generation_failed",
        }
    }
}

/// Generative stage a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Rerank,
    Synthesis,
}

/// Attached to `generation_failed` rejections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureInfo {
    pub stage: Stage,
    pub class: FailureClass,
    pub message: String,
    /// Whether the caller may retry the whole request with backoff.
    pub retryable: bool,
}

impl FailureInfo {
    fn new(stage: Stage, failure: &GenerationFailure) -> Self {
        Self {
            stage,
            class: failure.class(),
            message: failure.to_string(),
            retryable: failure.is_transient(),
        }
    }
}

/// Result of one planning invocation. Built once, never persisted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineOutcome {
    Success {
        build_packet: BuildPacket,
        confidence: Confidence,
        coverage_gaps: Vec<String>,
        /// Selected content ids in reranker order.
        videos_used: Vec<String>,
        total_candidates: usize,
    },
    Rejected {
        reason: RejectReason,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        coverage_gaps: Option<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        candidates_found: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        failure: Option<FailureInfo>,
    },
}

impl PipelineOutcome {
    /// `success`, or the rejection reason code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Rejected { reason, .. } => reason.code(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    fn no_content() -> Self {
        Self::Rejected {
            reason: RejectReason::NoContent,
            coverage_gaps: None,
            candidates_found: Some(0),
            failure: None,
        }
    }

    fn low_confidence(coverage_gaps: Vec<String>, candidates_found: usize) -> Self {
        Self::Rejected {
            reason: RejectReason::LowConfidence,
            coverage_gaps: Some(coverage_gaps),
            candidates_found: Some(candidates_found),
            failure: None,
        }
    }

    /// A generative failure. Once the reranker has answered, its coverage
    /// gaps and the candidate count travel with the rejection.
    fn generation_failed(
        stage: Stage,
        failure: &GenerationFailure,
        coverage_gaps: Option<Vec<String>>,
        candidates_found: Option<usize>,
    ) -> Self {
        Self::Rejected {
            reason: RejectReason::GenerationFailed,
            coverage_gaps,
            candidates_found,
            failure: Some(FailureInfo::new(stage, failure)),
        }
    }
}

/// Infrastructure failures outside the generative stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("brief must not be empty")]
    EmptyBrief,

    #[error("candidate store failed: {0:#}")]
    Store(anyhow::Error),

    #[error("creator profile lookup failed: {0:#}")]
    Profile(anyhow::Error),

    #[error("planning cancelled")]
    Cancelled,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Candidates requested from retrieval.
    pub retrieval_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retrieval_limit: 100,
        }
    }
}

/// Retrieve, rerank, gate on confidence, synthesize.
///
/// Holds no per-request state, so one instance serves concurrent requests.
#[derive(Clone)]
pub struct PlanningPipeline {
    retriever: Retriever,
    store: Arc<dyn CandidateStore>,
    profiles: Arc<dyn ProfileSource>,
    reranker: Arc<dyn Rerank>,
    synthesizer: Arc<dyn Synthesize>,
    config: PipelineConfig,
}

impl std::fmt::Debug for PlanningPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanningPipeline")
            .field("retriever", &self.retriever)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PlanningPipeline {
    pub fn new(
        store: Arc<dyn CandidateStore>,
        profiles: Arc<dyn ProfileSource>,
        reranker: Arc<dyn Rerank>,
        synthesizer: Arc<dyn Synthesize>,
    ) -> Self {
        Self {
            retriever: Retriever::new(store.clone()),
            store,
            profiles,
            reranker,
            synthesizer,
            config: PipelineConfig::default(),
        }
    }

    /// Enable semantic retrieval.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.retriever = self.retriever.with_embedder(embedder);
        self
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Run one planning invocation.
    ///
    /// Business outcomes (including generative failures) come back as
    /// `Ok(PipelineOutcome)`. `Err` is reserved for an empty brief, store or
    /// profile failures, and cancellation.
    pub async fn plan_product(
        &self,
        request: &PlanRequest,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutcome, PipelineError> {
        let brief = request.brief.trim();
        if brief.is_empty() {
            return Err(PipelineError::EmptyBrief);
        }
        let owner_id = request.owner_id;
        let product_type = request.product_type;
        info!(%owner_id, %product_type, "planning product");

        // Retrieve
        let candidates = until_cancelled(
            cancel,
            self.retriever
                .retrieve(owner_id, brief, self.config.retrieval_limit),
        )
        .await?
        .map_err(PipelineError::Store)?;
        if candidates.is_empty() {
            info!(%owner_id, "no indexed content matched, rejecting");
            return Ok(PipelineOutcome::no_content());
        }

        // Rerank
        let decision = match until_cancelled(
            cancel,
            self.reranker.rerank(&candidates, brief, product_type),
        )
        .await?
        {
            Ok(decision) => decision,
            Err(failure) => {
                warn!(%owner_id, error = %failure, "rerank failed");
                return Ok(PipelineOutcome::generation_failed(
                    Stage::Rerank,
                    &failure,
                    None,
                    None,
                ));
            }
        };
        if decision.confidence == Confidence::Low {
            info!(
                %owner_id,
                candidates = candidates.len(),
                coverage_gaps = decision.coverage_gaps.len(),
                "reranker reported low confidence, rejecting"
            );
            return Ok(PipelineOutcome::low_confidence(
                decision.coverage_gaps,
                candidates.len(),
            ));
        }

        let by_id: HashMap<&str, &ContentCandidate> =
            candidates.iter().map(|c| (c.id.as_str(), c)).collect();
        let (selected, unknown): (Vec<&SelectedItem>, Vec<&SelectedItem>) = decision
            .selected
            .iter()
            .partition(|item| by_id.contains_key(item.candidate_id.as_str()));
        if !unknown.is_empty() {
            warn!(
                %owner_id,
                unknown = unknown.len(),
                "reranker returned ids outside the candidate set"
            );
        }
        if selected.is_empty() {
            let failure = GenerationFailure::HallucinatedReferences {
                dropped: unknown.iter().map(|i| i.candidate_id.clone()).collect(),
            };
            return Ok(PipelineOutcome::generation_failed(
                Stage::Rerank,
                &failure,
                Some(decision.coverage_gaps.clone()),
                Some(candidates.len()),
            ));
        }

        // Enrich with full cards, then load the creator profile.
        let content = until_cancelled(cancel, self.enrich(owner_id, &by_id, &selected))
            .await?
            .map_err(PipelineError::Store)?;
        let profile = until_cancelled(cancel, self.profiles.creator_profile(owner_id))
            .await?
            .map_err(PipelineError::Profile)?;

        // Synthesize
        let input = SynthesisInput {
            brief,
            product_type,
            audience: non_blank(request.audience.as_deref()),
            tone: non_blank(request.tone.as_deref()),
            mood: non_blank(request.mood.as_deref()),
            profile: &profile,
            content: &content,
        };
        let build_packet =
            match until_cancelled(cancel, self.synthesizer.synthesize(&input)).await? {
                Ok(packet) => packet,
                Err(failure) => {
                    warn!(%owner_id, error = %failure, "synthesis failed");
                    return Ok(PipelineOutcome::generation_failed(
                        Stage::Synthesis,
                        &failure,
                        Some(decision.coverage_gaps),
                        Some(candidates.len()),
                    ));
                }
            };

        let videos_used: Vec<String> = content.iter().map(|c| c.candidate_id.clone()).collect();
        info!(
            %owner_id,
            %product_type,
            confidence = %decision.confidence,
            videos_used = videos_used.len(),
            total_candidates = candidates.len(),
            "product plan ready"
        );
        Ok(PipelineOutcome::Success {
            build_packet,
            confidence: decision.confidence,
            coverage_gaps: decision.coverage_gaps,
            videos_used,
            total_candidates: candidates.len(),
        })
    }

    /// Full cards for the selection, in selection order. A card the store
    /// no longer returns falls back to the one seen at retrieval time.
    async fn enrich(
        &self,
        owner_id: Uuid,
        candidates: &HashMap<&str, &ContentCandidate>,
        selected: &[&SelectedItem],
    ) -> anyhow::Result<Vec<SelectedContent>> {
        let ids: Vec<String> = selected.iter().map(|s| s.candidate_id.clone()).collect();
        let mut cards: HashMap<String, _> = self
            .store
            .fetch_cards(owner_id, &ids)
            .await?
            .into_iter()
            .filter(|card| card.owner_id == owner_id)
            .map(|card| (card.id.clone(), card))
            .collect();

        let content = selected
            .iter()
            .filter_map(|item| {
                let candidate = candidates.get(item.candidate_id.as_str())?;
                let (title, summary_card) = match cards.remove(&item.candidate_id) {
                    Some(card) => (
                        card.title.or_else(|| candidate.title.clone()),
                        card.summary_card,
                    ),
                    None => {
                        warn!(
                            content_id = %item.candidate_id,
                            "full card unavailable, using retrieval card"
                        );
                        (candidate.title.clone(), candidate.summary_card.clone())
                    }
                };
                Some(SelectedContent {
                    candidate_id: item.candidate_id.clone(),
                    title,
                    reason: item.reason.clone(),
                    summary_card,
                })
            })
            .collect();
        Ok(content)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Race `fut` against `cancel`; cancellation wins ties and drops `fut`.
async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, PipelineError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(PipelineError::Cancelled),
        out = fut => Ok(out),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn rejection_serializes_with_status_tag() {
        let outcome = PipelineOutcome::low_confidence(vec!["nutrition".to_string()], 7);
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({
                "status": "rejected",
                "reason": "low_confidence",
                "coverage_gaps": ["nutrition"],
                "candidates_found": 7
            })
        );
        assert_eq!(outcome.code(), "low_confidence");
    }

    #[test]
    fn no_content_omits_optional_fields() {
        let value = serde_json::to_value(PipelineOutcome::no_content()).unwrap();
        assert_eq!(
            value,
            json!({ "status": "rejected", "reason": "no_content", "candidates_found": 0 })
        );
    }

    #[test]
    fn generation_failure_carries_descriptor() {
        let failure = GenerationFailure::SchemaValidation {
            schema: "course_packet".to_string(),
            diagnostic: "missing required field `modules`".to_string(),
        };
        let outcome = PipelineOutcome::generation_failed(
            Stage::Synthesis,
            &failure,
            Some(vec!["breathwork".to_string()]),
            Some(40),
        );
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["coverage_gaps"], json!(["breathwork"]));
        assert_eq!(value["candidates_found"], 40);
        assert_eq!(value["failure"]["stage"], "synthesis");
        assert_eq!(value["failure"]["class"], "schema");
        assert_eq!(value["failure"]["retryable"], false);
        assert_eq!(outcome.code(), "generation_failed");
    }

    #[test]
    fn plan_request_optional_fields_default() {
        let owner = Uuid::new_v4();
        let request: PlanRequest = serde_json::from_value(json!({
            "owner_id": owner,
            "product_type": "mini_course",
            "brief": "morning stretches"
        }))
        .unwrap();
        assert_eq!(request.product_type, ProductType::MiniCourse);
        assert_eq!(request.audience, None);
    }

    #[test]
    fn blank_adjustments_are_ignored() {
        assert_eq!(non_blank(Some("  ")), None);
        assert_eq!(non_blank(Some(" calm ")), Some("calm"));
        assert_eq!(non_blank(None), None);
    }
}
