// src/provider/retry.rs — Retry policy wrapped around every model backend
//
// Failures are classified before anything is retried:
//   throttled  429 or quota errors. Waits for the server hint, never less than
//              the throttle floor.
//   transient  5xx, timeouts, connection resets. Exponential ceiling, full jitter.
//   fatal      auth, bad request, unreadable bodies. Returned at once.
// When the budget runs out the error names the attempt count and the last
// failure; the generation client records that text as the NoResponse reason.
// The caller's span (problem, stage, task) is attached to every retry line.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use super::{ChatRequest, ChatResponse, ModelProvider};
use crate::infra::errors::SelfEvolveError;

const MAX_RETRIES: u32 = 8;
const BASE_DELAY: Duration = Duration::from_secs(1);
const MAX_DELAY: Duration = Duration::from_secs(60);
const THROTTLE_FLOOR: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Throttled { retry_after: Option<Duration> },
    Transient,
    Fatal,
}

impl FailureClass {
    pub fn of(error: &SelfEvolveError) -> Self {
        match error {
            SelfEvolveError::RateLimited { retry_after_ms, .. } => FailureClass::Throttled {
                retry_after: (*retry_after_ms > 0).then(|| Duration::from_millis(*retry_after_ms)),
            },
            e if e.is_retriable() => FailureClass::Transient,
            _ => FailureClass::Fatal,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            FailureClass::Throttled { .. } => "throttled",
            FailureClass::Transient => "transient",
            FailureClass::Fatal => "fatal",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first call; 0 disables retrying.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub throttle_floor: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            base_delay: BASE_DELAY,
            max_delay: MAX_DELAY,
            throttle_floor: THROTTLE_FLOOR,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Wait before retry `retry` (0-based), or `None` when the failure is not
    /// worth retrying. `jitter` is a draw from `[0, 1]`.
    pub fn delay(&self, class: FailureClass, retry: u32, jitter: f64) -> Option<Duration> {
        let ceiling = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(retry))
            .min(self.max_delay);
        match class {
            FailureClass::Fatal => None,
            FailureClass::Transient => Some(ceiling.mul_f64(jitter.clamp(0.0, 1.0))),
            FailureClass::Throttled { retry_after } => {
                Some(retry_after.unwrap_or(ceiling).max(self.throttle_floor))
            }
        }
    }
}

pub struct RetryProvider {
    inner: Arc<dyn ModelProvider>,
    policy: RetryPolicy,
}

impl RetryProvider {
    pub fn new(inner: Arc<dyn ModelProvider>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn retrying<T, F, Fut>(&self, op: &'static str, mut call: F) -> Result<T, SelfEvolveError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, SelfEvolveError>> + Send,
        T: Send,
    {
        let mut retry = 0;
        loop {
            let err = match call().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            let class = FailureClass::of(&err);
            let jitter: f64 = rand::thread_rng().gen();
            let Some(delay) = self.policy.delay(class, retry, jitter) else {
                return Err(err);
            };
            if retry >= self.policy.max_retries {
                return Err(SelfEvolveError::Provider {
                    provider: self.inner.id().to_string(),
                    message: format!("gave up after {} attempts: {err}", retry + 1),
                    retriable: false,
                });
            }

            tracing::warn!(
                provider = self.inner.id(),
                op,
                class = class.label(),
                retry = retry + 1,
                max_retries = self.policy.max_retries,
                delay_ms = delay.as_millis() as u64,
                "Model call failed, retrying: {}",
                err
            );
            tokio::time::sleep(delay).await;
            retry += 1;
        }
    }
}

#[async_trait]
impl ModelProvider for RetryProvider {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, SelfEvolveError> {
        self.retrying("chat", || self.inner.chat(request.clone())).await
    }

    async fn embed(&self, model: &str, texts: &[&str]) -> Result<Vec<Vec<f32>>, SelfEvolveError> {
        self.retrying("embed", || self.inner.embed(model, texts)).await
    }
}
