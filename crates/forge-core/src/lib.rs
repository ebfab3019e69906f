//! Content-to-product planning: retrieval, LLM reranking with a confidence
//! gate, and schema-validated build packet synthesis.

pub mod candidate;
pub mod generation;
pub mod packet;
pub mod pipeline;
pub mod profile;
pub mod rerank;
pub mod retrieval;
pub mod store;
