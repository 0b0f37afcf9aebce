// src/core/correction.rs — Generate, evaluate, and correct until pass or budget
//
// Attempt 0 is the initial generation. While the last verdict is a Fail with
// feedback, correction is enabled, and fewer than `max_attempts` generations
// have run, another correction attempt is made from the harness-rewritten code.

use std::path::Path;
use std::sync::Arc;

use super::generator::{GenerationClient, GenerationOutcome, GenerationRequest};
use super::types::{Attempt, Problem, ProgressEvent, ProgressFn, Stage, Strategy, Termination, Verdict};
use crate::evaluator::Evaluator;
use crate::infra::errors::SelfEvolveError;
use crate::infra::paths::ProblemLayout;

/// Feedback given when an answer holds no parseable code; the evaluator is skipped.
pub const INVALID_CANDIDATE_FEEDBACK: &str = "The answer did not contain a valid Python code \
block. Reply with exactly one ```python fenced block holding only the code for the [insert] slot.";

/// Budget and switches for one problem.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopSettings {
    pub initial_strategy: Strategy,
    pub correction_strategy: Strategy,
    pub self_correction: bool,
    /// Total generations allowed, the initial one included.
    pub max_attempts: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopReport {
    pub attempts: Vec<Attempt>,
    pub termination: Termination,
}

pub struct CorrectionLoop {
    initial: Arc<GenerationClient>,
    correction: Arc<GenerationClient>,
    evaluator: Arc<dyn Evaluator>,
    settings: LoopSettings,
    progress: Option<ProgressFn>,
}

impl CorrectionLoop {
    pub fn new(
        initial: Arc<GenerationClient>,
        correction: Arc<GenerationClient>,
        evaluator: Arc<dyn Evaluator>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            initial,
            correction,
            evaluator,
            settings,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(ref cb) = self.progress {
            cb(event);
        }
    }

    pub async fn run(
        &self,
        problem: &Problem,
        layout: &ProblemLayout,
    ) -> Result<LoopReport, SelfEvolveError> {
        let mut attempts = Vec::new();

        let mut verdict = self
            .attempt(problem, layout, Stage::Initial, 0, "", "", &mut attempts)
            .await?;

        let termination = loop {
            let (code, feedback) = match verdict {
                Verdict::Pass => break Termination::Passed,
                Verdict::OpaqueFail => break Termination::OpaqueFail,
                Verdict::NoResponse { .. } => break Termination::NoResponse,
                Verdict::Fail {
                    rewritten_code,
                    feedback,
                } => (rewritten_code, feedback),
            };

            if !self.settings.self_correction {
                break Termination::CorrectionDisabled;
            }
            let made = attempts.len() as u32;
            if made >= self.settings.max_attempts {
                break Termination::ExhaustedAttempts;
            }

            verdict = self
                .attempt(problem, layout, Stage::Correction, made, &code, &feedback, &mut attempts)
                .await?;
        };

        tracing::info!(
            problem = %problem.id,
            attempts = attempts.len(),
            termination = termination.as_str(),
            "Problem finished"
        );
        Ok(LoopReport {
            attempts,
            termination,
        })
    }

    /// One generate-then-evaluate step. Records the attempt and returns its verdict.
    #[allow(clippy::too_many_arguments)]
    async fn attempt(
        &self,
        problem: &Problem,
        layout: &ProblemLayout,
        stage: Stage,
        index: u32,
        prior_code: &str,
        feedback: &str,
        attempts: &mut Vec<Attempt>,
    ) -> Result<Verdict, SelfEvolveError> {
        let (client, strategy) = match stage {
            Stage::Initial => (&self.initial, self.settings.initial_strategy),
            Stage::Correction => (&self.correction, self.settings.correction_strategy),
        };
        let log_dir = layout.attempt_dir(stage, index);
        create_dir(&log_dir).await?;

        self.emit(ProgressEvent::AttemptStart {
            problem: problem.id.clone(),
            stage,
            index,
            max_attempts: self.settings.max_attempts,
        });
        tracing::debug!(problem = %problem.id, %stage, index, model = client.model().as_str(), "Attempt start");

        let outcome = client
            .generate(GenerationRequest {
                stage,
                strategy,
                problem,
                prior_code,
                feedback,
                log_dir: &log_dir,
            })
            .await?;

        let (generated_code, verdict) = match outcome {
            GenerationOutcome::NoResponse { reason } => (String::new(), Verdict::NoResponse { reason }),
            GenerationOutcome::Answer(answer) if answer.code.is_empty() => {
                tracing::debug!(problem = %problem.id, index, "No valid code in answer");
                (
                    String::new(),
                    Verdict::Fail {
                        rewritten_code: String::new(),
                        feedback: INVALID_CANDIDATE_FEEDBACK.to_string(),
                    },
                )
            }
            GenerationOutcome::Answer(answer) => {
                let verdict = self.evaluator.evaluate(problem, &answer.code).await?;
                (answer.code, verdict)
            }
        };

        self.emit(ProgressEvent::AttemptEnd {
            problem: problem.id.clone(),
            stage,
            index,
            verdict: verdict.label(),
        });

        attempts.push(Attempt {
            stage,
            index,
            generated_code,
            verdict: verdict.clone(),
            log_dir,
        });
        Ok(verdict)
    }
}

async fn create_dir(dir: &Path) -> Result<(), SelfEvolveError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| SelfEvolveError::persistence(dir, e))
}
