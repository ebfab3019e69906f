//! Packet synthesis: the second generative call of the pipeline.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::info;

use super::prompt::{build_system_prompt, build_user_prompt};
use super::schema::PacketSchema;
use super::{BuildPacket, ProductType};
use crate::candidate::SelectedContent;
use crate::generation::{GenerationFailure, ReasoningMode, StructuredGateway, StructuredRequest};
use crate::profile::CreatorProfile;

/// Everything one synthesis call needs. The synthesizer never looks
/// anything up on its own.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInput<'a> {
    pub brief: &'a str,
    pub product_type: ProductType,
    pub audience: Option<&'a str>,
    pub tone: Option<&'a str>,
    pub mood: Option<&'a str>,
    pub profile: &'a CreatorProfile,
    /// Reranker-ordered, ID-validated content with full summary cards.
    pub content: &'a [SelectedContent],
}

/// The synthesis stage, as seen by the pipeline.
#[async_trait]
pub trait Synthesize: Send + Sync {
    async fn synthesize(
        &self,
        input: &SynthesisInput<'_>,
    ) -> Result<BuildPacket, GenerationFailure>;
}

#[derive(Debug, Clone)]
pub struct SynthesizerConfig {
    pub max_tokens: u32,
    pub reasoning: ReasoningMode,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            max_tokens: 16_000,
            reasoning: ReasoningMode::Enabled,
        }
    }
}

/// Produces a [`BuildPacket`] through a [`StructuredGateway`].
#[derive(Debug, Clone)]
pub struct PacketSynthesizer {
    gateway: StructuredGateway,
    config: SynthesizerConfig,
    schemas: HashMap<ProductType, PacketSchema>,
}

impl PacketSynthesizer {
    pub fn new(gateway: StructuredGateway, config: SynthesizerConfig) -> Self {
        Self {
            gateway,
            config,
            schemas: HashMap::new(),
        }
    }

    /// Replace the default schema for one product type.
    pub fn with_schema(mut self, product_type: ProductType, schema: PacketSchema) -> Self {
        self.schemas.insert(product_type, schema);
        self
    }

    /// The schema packets of `product_type` are validated against.
    pub fn schema_for(&self, product_type: ProductType) -> PacketSchema {
        self.schemas
            .get(&product_type)
            .cloned()
            .unwrap_or_else(|| PacketSchema::for_product(product_type))
    }
}

#[async_trait]
impl Synthesize for PacketSynthesizer {
    async fn synthesize(
        &self,
        input: &SynthesisInput<'_>,
    ) -> Result<BuildPacket, GenerationFailure> {
        let schema = self.schema_for(input.product_type);
        let system_prompt = build_system_prompt(input);
        let user_prompt = build_user_prompt(input, &schema);

        let packet = self
            .gateway
            .request_structured(
                StructuredRequest {
                    system_prompt: &system_prompt,
                    user_prompt: &user_prompt,
                    max_tokens: self.config.max_tokens,
                    reasoning: self.config.reasoning,
                },
                &schema,
            )
            .await?;

        info!(
            product_type = %input.product_type,
            content_items = input.content.len(),
            title = packet.title().unwrap_or_default(),
            "build packet synthesized"
        );
        Ok(packet)
    }
}
