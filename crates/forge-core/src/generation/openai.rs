//! OpenAI-compatible chat-completions backend.
//!
//! Works against any endpoint that accepts `POST {base_url}/chat/completions`
//! with the OpenAI request shape (OpenAI, OpenRouter, vLLM, llama.cpp
//! server). The `reasoning` block is the OpenRouter extension; servers that
//! do not understand it ignore it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::backend::{CompletionRequest, GenerativeBackend, ResponseFormat, TransportError};

/// Longest error body kept in a [`TransportError::Http`].
const ERROR_BODY_CHARS: usize = 1_000;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<FormatSpec>,
    reasoning: ReasoningSpec,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct FormatSpec {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ReasoningSpec {
    enabled: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP client for an OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct OpenAiBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl OpenAiBackend {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, api_key)
    }

    /// Use a preconfigured client (proxies, custom TLS roots).
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

fn build_body(request: &CompletionRequest) -> ChatRequest<'_> {
    ChatRequest {
        model: &request.model,
        messages: [
            ChatMessage {
                role: "system",
                content: &request.system_prompt,
            },
            ChatMessage {
                role: "user",
                content: &request.user_prompt,
            },
        ],
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        response_format: match request.response_format {
            ResponseFormat::JsonObject => Some(FormatSpec {
                kind: "json_object",
            }),
            ResponseFormat::Text => None,
        },
        reasoning: ReasoningSpec {
            enabled: request.reasoning.is_enabled(),
        },
    }
}

/// Pull the first choice's text out of a completion envelope.
///
/// A null or blank message is returned as empty text: the model answered,
/// so the structured gateway reports it as unparsable output rather than a
/// transport failure.
fn completion_text(body: &str) -> Result<String, TransportError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| TransportError::MalformedEnvelope(e.to_string()))?;
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| TransportError::MalformedEnvelope("no choices in response".to_string()))?;
    Ok(choice.message.content.unwrap_or_default())
}

#[async_trait]
impl GenerativeBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, TransportError> {
        let mut builder = self.client.post(self.endpoint()).json(&build_body(request));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        debug!(status = status.as_u16(), bytes = body.len(), "completion response received");

        if !status.is_success() {
            return Err(TransportError::Http {
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_CHARS).collect(),
            });
        }

        completion_text(&body)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::generation::backend::ReasoningMode;

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "gpt-test".to_string(),
            system_prompt: "sys".to_string(),
            user_prompt: "usr".to_string(),
            max_tokens: 100,
            temperature: 1.0,
            reasoning: ReasoningMode::Enabled,
            response_format: ResponseFormat::JsonObject,
        }
    }

    #[test]
    fn body_has_openai_shape() {
        let req = request();
        let body = serde_json::to_value(build_body(&req)).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "gpt-test",
                "messages": [
                    { "role": "system", "content": "sys" },
                    { "role": "user", "content": "usr" }
                ],
                "max_tokens": 100,
                "temperature": 1.0,
                "response_format": { "type": "json_object" },
                "reasoning": { "enabled": true }
            })
        );
    }

    #[test]
    fn text_format_omits_response_format() {
        let mut req = request();
        req.response_format = ResponseFormat::Text;
        let body = serde_json::to_value(build_body(&req)).unwrap();
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn extracts_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"{\"a\":1}"}}]}"#;
        assert_eq!(completion_text(body).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn null_content_is_empty_text() {
        let null = r#"{"choices":[{"message":{"content":null}}]}"#;
        assert_eq!(completion_text(null).unwrap(), "");
    }

    #[test]
    fn missing_choices_is_an_error() {
        let none = r#"{"choices":[]}"#;
        assert!(matches!(
            completion_text(none),
            Err(TransportError::MalformedEnvelope(_))
        ));

        assert!(matches!(
            completion_text("<html>bad gateway</html>"),
            Err(TransportError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn trims_trailing_slash_and_drops_blank_key() {
        let backend = OpenAiBackend::new("https://api.example.com/v1/", Some(String::new()));
        assert_eq!(backend.endpoint(), "https://api.example.com/v1/chat/completions");
        assert!(backend.api_key.is_none());
    }
}
