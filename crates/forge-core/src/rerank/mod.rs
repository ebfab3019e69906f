//! LLM-backed reranking of retrieval candidates.
//!
//! ```text
//!  candidates + brief
//!         │
//!         ▼
//!  ┌──────────────┐   rerank_decision   ┌───────────────┐
//!  │   Reranker   │ ──────────────────▶ │ StructuredGW  │
//!  └──────┬───────┘                     └───────────────┘
//!         │ reconcile: drop unknown ids, dedupe, cap
//!         ▼
//!   RerankDecision { selected, confidence, coverage_gaps }
//! ```
//!
//! The model's reply is untrusted. Every selected id is checked against
//! the candidates that were actually sent; unknown ids are dropped rather
//! than failing the call, unless nothing survives.

pub mod prompt;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::candidate::ContentCandidate;
use crate::generation::{
    GenerationFailure, OutputSchema, ReasoningMode, StructuredGateway, StructuredRequest, Typed,
    Validate,
};
use crate::packet::ProductType;

// ---------------------------------------------------------------------------
// Confidence
// ---------------------------------------------------------------------------

/// The reranker's judgement of whether the content supports the product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        };
        f.write_str(s)
    }
}

impl FromStr for Confidence {
    type Err = ConfidenceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(ConfidenceParseError(s.to_owned())),
        }
    }
}

impl TryFrom<String> for Confidence {
    type Error = ConfidenceParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Error returned when parsing an invalid [`Confidence`] string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid confidence: {0:?} (expected high, medium, or low)")]
pub struct ConfidenceParseError(pub String);

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedItem {
    pub candidate_id: String,
    pub reason: String,
}

/// Validated reranker output. Every `candidate_id` refers to a candidate
/// that was passed in, and `selected` is in presentation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankDecision {
    pub selected: Vec<SelectedItem>,
    pub confidence: Confidence,
    pub coverage_gaps: Vec<String>,
}

/// Reply shape as the model writes it, before id reconciliation.
#[derive(Debug, Clone, Deserialize)]
struct RerankResponse {
    #[serde(alias = "selectedItems", alias = "selected_items")]
    selected: Vec<RawSelection>,
    confidence: Confidence,
    #[serde(default, alias = "coverageGaps")]
    coverage_gaps: Vec<String>,
}

impl Validate for RerankResponse {}

/// A selection entry. Bare id strings are accepted too.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawSelection {
    Item {
        #[serde(alias = "candidate_id", alias = "candidateId")]
        id: String,
        #[serde(default)]
        reason: String,
    },
    Id(String),
}

impl RawSelection {
    fn into_parts(self) -> (String, String) {
        match self {
            Self::Item { id, reason } => (id, reason),
            Self::Id(id) => (id, String::new()),
        }
    }
}

const RERANK_DECISION: Typed<RerankResponse> = Typed::new("rerank_decision");

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// The reranking stage, as seen by the pipeline.
#[async_trait]
pub trait Rerank: Send + Sync {
    async fn rerank(
        &self,
        candidates: &[ContentCandidate],
        brief: &str,
        product_type: ProductType,
    ) -> Result<RerankDecision, GenerationFailure>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn Rerank) {}
};

#[derive(Debug, Clone)]
pub struct RerankerConfig {
    /// Upper bound on selected items, applied after reconciliation.
    pub max_selected: usize,
    /// Characters of each summary card sent to the model.
    pub card_chars: usize,
    pub max_tokens: u32,
    pub reasoning: ReasoningMode,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            max_selected: 12,
            card_chars: 800,
            max_tokens: 4_000,
            reasoning: ReasoningMode::Disabled,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Reranker {
    gateway: StructuredGateway,
    config: RerankerConfig,
}

impl Reranker {
    pub fn new(gateway: StructuredGateway, config: RerankerConfig) -> Self {
        Self { gateway, config }
    }

    pub fn config(&self) -> &RerankerConfig {
        &self.config
    }
}

#[async_trait]
impl Rerank for Reranker {
    async fn rerank(
        &self,
        candidates: &[ContentCandidate],
        brief: &str,
        product_type: ProductType,
    ) -> Result<RerankDecision, GenerationFailure> {
        let user_prompt = prompt::build_user_prompt(
            candidates,
            brief,
            product_type,
            self.config.card_chars,
            self.config.max_selected,
        );

        let response = self
            .gateway
            .request_structured(
                StructuredRequest {
                    system_prompt: prompt::SYSTEM_PROMPT,
                    user_prompt: &user_prompt,
                    max_tokens: self.config.max_tokens,
                    reasoning: self.config.reasoning,
                },
                &RERANK_DECISION,
            )
            .await?;

        let decision = reconcile(response, candidates, self.config.max_selected)?;
        info!(
            candidates = candidates.len(),
            selected = decision.selected.len(),
            confidence = %decision.confidence,
            coverage_gaps = decision.coverage_gaps.len(),
            "rerank complete"
        );
        Ok(decision)
    }
}

/// Check the model's selections against the candidates that were sent.
fn reconcile(
    response: RerankResponse,
    candidates: &[ContentCandidate],
    max_selected: usize,
) -> Result<RerankDecision, GenerationFailure> {
    let known: HashSet<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
    let mut seen: HashSet<String> = HashSet::new();
    let mut selected = Vec::new();
    let mut dropped = Vec::new();
    let mut over_cap = 0usize;

    for raw in response.selected {
        let (id, reason) = raw.into_parts();
        let id = id.trim();
        if !known.contains(id) {
            dropped.push(id.to_string());
            continue;
        }
        if !seen.insert(id.to_string()) {
            debug!(candidate_id = id, "ignoring duplicate selection");
            continue;
        }
        if selected.len() >= max_selected {
            over_cap += 1;
            continue;
        }
        selected.push(SelectedItem {
            candidate_id: id.to_string(),
            reason: reason.trim().to_string(),
        });
    }

    if !dropped.is_empty() {
        warn!(dropped = ?dropped, "reranker selected unknown candidate ids");
    }
    if over_cap > 0 {
        debug!(over_cap, max_selected, "selection capped");
    }

    if selected.is_empty() && response.confidence != Confidence::Low {
        if !dropped.is_empty() {
            return Err(GenerationFailure::HallucinatedReferences { dropped });
        }
        return Err(GenerationFailure::SchemaValidation {
            schema: RERANK_DECISION.name().to_string(),
            diagnostic: format!(
                "no items selected despite {} confidence",
                response.confidence
            ),
        });
    }

    Ok(RerankDecision {
        selected,
        confidence: response.confidence,
        coverage_gaps: response.coverage_gaps,
    })
}
