// src/evaluator/mod.rs — Judging generated code against a problem's tests

pub mod harness;

use async_trait::async_trait;

use crate::core::types::{Problem, Verdict};
use crate::infra::errors::SelfEvolveError;

pub use harness::HarnessEvaluator;

/// Runs a candidate against the problem's tests.
///
/// Returns `Pass`, `Fail` or `OpaqueFail`. An `Err` means the harness itself
/// broke and is treated as fatal by callers.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, problem: &Problem, code: &str) -> Result<Verdict, SelfEvolveError>;
}
