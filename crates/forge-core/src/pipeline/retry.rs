//! Retry with exponential backoff and jitter for the generative stages.
//!
//! Retries live in a decorator around [`Rerank`] and [`Synthesize`] so the
//! pipeline itself sends each request once and stays deterministic under a
//! fake backend.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::warn;

use crate::candidate::ContentCandidate;
use crate::generation::{FailureClass, GenerationFailure};
use crate::packet::{BuildPacket, ProductType, SynthesisInput, Synthesize};
use crate::rerank::{Rerank, RerankDecision};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first. `1` disables retries.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    /// Scale each delay by a random factor in ±30%.
    pub jitter: bool,
    /// Also retry parse and schema failures, not only transport ones.
    pub retry_malformed_output: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            multiplier: 2.0,
            jitter: true,
            retry_malformed_output: false,
        }
    }
}

impl RetryPolicy {
    /// A single attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    fn should_retry(&self, failure: &GenerationFailure) -> bool {
        failure.is_transient()
            || (self.retry_malformed_output
                && matches!(failure.class(), FailureClass::Parse | FailureClass::Schema))
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    /// The last failure is returned unchanged.
    pub async fn run<T, F, Fut>(&self, stage: &str, mut op: F) -> Result<T, GenerationFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GenerationFailure>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut backoff = self.initial_backoff;
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(out) => return Ok(out),
                Err(failure) if attempt < max_attempts && self.should_retry(&failure) => {
                    let delay = jittered(backoff, self.jitter);
                    warn!(
                        stage,
                        attempt,
                        max_attempts,
                        delay = ?delay,
                        error = %failure,
                        "generative stage failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    backoff = backoff.mul_f64(self.multiplier).min(self.max_backoff);
                    attempt += 1;
                }
                Err(failure) => return Err(failure),
            }
        }
    }
}

fn jittered(base: Duration, jitter: bool) -> Duration {
    if jitter {
        base.mul_f64(rand::rng().random_range(0.7..1.3))
    } else {
        base
    }
}

/// Applies a [`RetryPolicy`] to a reranker or synthesizer.
#[derive(Debug, Clone)]
pub struct Retrying<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S> Retrying<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<S: Rerank> Rerank for Retrying<S> {
    async fn rerank(
        &self,
        candidates: &[ContentCandidate],
        brief: &str,
        product_type: ProductType,
    ) -> Result<RerankDecision, GenerationFailure> {
        let inner = &self.inner;
        self.policy
            .run("rerank", move || inner.rerank(candidates, brief, product_type))
            .await
    }
}

#[async_trait]
impl<S: Synthesize> Synthesize for Retrying<S> {
    async fn synthesize(
        &self,
        input: &SynthesisInput<'_>,
    ) -> Result<BuildPacket, GenerationFailure> {
        let inner = &self.inner;
        self.policy
            .run("synthesis", move || inner.synthesize(input))
            .await
    }
}
