//! Generative model plumbing: the backend boundary and the structured-output
//! gateway built on top of it.
//!
//! ```text
//! Reranker / PacketSynthesizer
//!     |
//!     v
//! StructuredGateway --request_structured(prompts, schema)--> T
//!     |   1. one CompletionRequest (deadline enforced)
//!     |   2. strip fence, parse, single salvage pass
//!     |   3. OutputSchema::check
//!     v
//! dyn GenerativeBackend --complete()--> raw text
//! ```

pub mod backend;
pub mod extract;
pub mod gateway;
pub mod openai;
pub mod schema;

pub use backend::{
    CompletionRequest, GenerativeBackend, ReasoningMode, ResponseFormat, TransportError,
};
pub use gateway::{FailureClass, GenerationFailure, StructuredGateway, StructuredRequest};
pub use openai::OpenAiBackend;
pub use schema::{OutputSchema, Typed, Validate};
