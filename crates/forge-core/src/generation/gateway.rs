//! Structured-output gateway shared by the reranker and the synthesizer.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::backend::{
    CompletionRequest, GenerativeBackend, ReasoningMode, ResponseFormat, TransportError,
};
use super::extract;
use super::schema::OutputSchema;

/// Longest slice of raw model output kept for diagnostics.
const SNIPPET_CHARS: usize = 500;

/// Coarse failure category surfaced to callers and telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    Transport,
    Parse,
    Schema,
    HallucinatedReference,
}

/// A generative stage could not produce trustworthy structured output.
#[derive(Debug, Clone, Error)]
pub enum GenerationFailure {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("model output is not valid JSON: {message}")]
    Parse { message: String, snippet: String },

    #[error("model output violates the {schema} schema: {diagnostic}")]
    SchemaValidation { schema: String, diagnostic: String },

    #[error("every selected reference was unknown: {}", dropped.join(", "))]
    HallucinatedReferences { dropped: Vec<String> },
}

impl GenerationFailure {
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Transport(_) => FailureClass::Transport,
            Self::Parse { .. } => FailureClass::Parse,
            Self::SchemaValidation { .. } => FailureClass::Schema,
            Self::HallucinatedReferences { .. } => FailureClass::HallucinatedReference,
        }
    }

    /// Whether the same request could plausibly succeed if sent again
    /// unchanged. Only transport failures qualify.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Prompt and sampling settings for one structured request.
#[derive(Debug, Clone, Copy)]
pub struct StructuredRequest<'a> {
    pub system_prompt: &'a str,
    pub user_prompt: &'a str,
    pub max_tokens: u32,
    pub reasoning: ReasoningMode,
}

/// Sends prompts to a backend and returns only schema-validated output.
#[derive(Clone)]
pub struct StructuredGateway {
    backend: Arc<dyn GenerativeBackend>,
    model: String,
    deadline: Duration,
}

impl std::fmt::Debug for StructuredGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuredGateway")
            .field("backend", &self.backend.name())
            .field("model", &self.model)
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl StructuredGateway {
    pub fn new(
        backend: Arc<dyn GenerativeBackend>,
        model: impl Into<String>,
        deadline: Duration,
    ) -> Self {
        Self {
            backend,
            model: model.into(),
            deadline,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Send exactly one request and validate the reply against `schema`.
    ///
    /// Failures are reported in three distinct classes: the backend could
    /// not be reached in time (`Transport`), the reply was not JSON even
    /// after salvage (`Parse`), or it was JSON of the wrong shape
    /// (`SchemaValidation`).
    pub async fn request_structured<S: OutputSchema>(
        &self,
        request: StructuredRequest<'_>,
        schema: &S,
    ) -> Result<S::Output, GenerationFailure> {
        let completion = CompletionRequest {
            model: self.model.clone(),
            system_prompt: request.system_prompt.to_string(),
            user_prompt: request.user_prompt.to_string(),
            max_tokens: request.max_tokens,
            temperature: request.reasoning.temperature(),
            reasoning: request.reasoning,
            response_format: ResponseFormat::JsonObject,
        };

        debug!(
            schema = schema.name(),
            model = %self.model,
            system_chars = completion.system_prompt.len(),
            user_chars = completion.user_prompt.len(),
            "sending structured request"
        );

        let reply = tokio::time::timeout(self.deadline, self.backend.complete(&completion)).await;
        let text = match reply {
            Ok(Ok(text)) => text,
            Ok(Err(err)) => {
                warn!(schema = schema.name(), error = %err, "generative backend request failed");
                return Err(err.into());
            }
            Err(_) => {
                warn!(
                    schema = schema.name(),
                    deadline = ?self.deadline,
                    "generative backend request timed out"
                );
                return Err(TransportError::Timeout {
                    after: self.deadline,
                }
                .into());
            }
        };

        let value = extract::parse_model_json(&text).map_err(|err| {
            let snippet = snippet(&text);
            warn!(
                schema = schema.name(),
                error = %err,
                snippet = %snippet,
                "model output is not valid JSON"
            );
            GenerationFailure::Parse {
                message: err.to_string(),
                snippet,
            }
        })?;

        schema.check(value).map_err(|diagnostic| {
            warn!(
                schema = schema.name(),
                diagnostic = %diagnostic,
                "model output failed schema validation"
            );
            GenerationFailure::SchemaValidation {
                schema: schema.name().to_string(),
                diagnostic,
            }
        })
    }
}

fn snippet(text: &str) -> String {
    text.chars().take(SNIPPET_CHARS).collect()
}
