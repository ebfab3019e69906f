//! The `GenerativeBackend` trait -- the text-in/text-out model boundary.
//!
//! Implementations only move text. Everything about what the text means
//! (fences, JSON, schemas) is handled by [`super::StructuredGateway`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Whether the model is asked to reason before answering.
///
/// Reasoning mode also selects the sampling temperature: a reasoning pass
/// tolerates more exploration, so it samples hotter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningMode {
    Enabled,
    #[default]
    Disabled,
}

impl ReasoningMode {
    pub fn temperature(self) -> f32 {
        match self {
            Self::Enabled => 1.0,
            Self::Disabled => 0.6,
        }
    }

    pub fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled)
    }
}

/// Output format hint forwarded to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    JsonObject,
    Text,
}

/// A single chat-style completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub reasoning: ReasoningMode,
    pub response_format: ResponseFormat,
}

/// Failure to obtain completion text from the backend at all.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("generative backend did not respond within {after:?}")]
    Timeout { after: Duration },

    #[error("generative backend returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("request to generative backend failed: {0}")]
    Network(String),

    #[error("unexpected completion envelope: {0}")]
    MalformedEnvelope(String),
}

/// A chat-completion endpoint.
///
/// Object-safe so pipelines can hold `Arc<dyn GenerativeBackend>` and tests
/// can substitute a scripted fake.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Short identifier used in logs (e.g. "openai-compatible").
    fn name(&self) -> &str;

    /// Send one request and return the raw completion text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, TransportError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn GenerativeBackend) {}
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasoning_selects_temperature() {
        assert_eq!(ReasoningMode::Enabled.temperature(), 1.0);
        assert_eq!(ReasoningMode::Disabled.temperature(), 0.6);
        assert_eq!(ReasoningMode::default(), ReasoningMode::Disabled);
    }

    #[test]
    fn reasoning_mode_serde_names() {
        let mode: ReasoningMode = serde_json::from_str("\"enabled\"").unwrap();
        assert!(mode.is_enabled());
        assert_eq!(
            serde_json::to_string(&ReasoningMode::Disabled).unwrap(),
            "\"disabled\""
        );
    }
}
