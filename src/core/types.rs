// src/core/types.rs — Core types for the generate/evaluate/correct loop

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::infra::errors::SelfEvolveError;
use crate::provider::LlmModel;

/// Which phase of a problem an attempt belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Initial,
    Correction,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Initial => "initial",
            Stage::Correction => "correction",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prompting strategy for a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum Strategy {
    /// Ask for code directly.
    #[serde(rename = "zeroshot")]
    #[value(name = "zeroshot")]
    ZeroShot,
    /// Ask for a reasoning hint first, then for code conditioned on it.
    #[serde(rename = "cot")]
    #[value(name = "cot")]
    ChainOfThought,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::ZeroShot => "zeroshot",
            Strategy::ChainOfThought => "cot",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = SelfEvolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zeroshot" => Ok(Strategy::ZeroShot),
            "cot" => Ok(Strategy::ChainOfThought),
            other => Err(SelfEvolveError::UnknownValue {
                kind: "strategy",
                value: other.to_string(),
            }),
        }
    }
}

/// What a single model request is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    CodeGeneration,
    CotGeneration,
}

impl Task {
    /// Log subdirectory for requests of this task.
    pub fn log_subdir(&self) -> &'static str {
        match self {
            Task::CodeGeneration => "code",
            Task::CotGeneration => "cot",
        }
    }
}

/// Result of evaluating one candidate, or of failing to produce one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    /// Failed with actionable feedback; `rewritten_code` seeds the next attempt.
    Fail {
        rewritten_code: String,
        feedback: String,
    },
    /// Failed without anything to act on.
    OpaqueFail,
    /// The model produced no answer.
    NoResponse { reason: String },
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Pass => "pass",
            Verdict::Fail { .. } => "fail",
            Verdict::OpaqueFail => "opaque-fail",
            Verdict::NoResponse { .. } => "no-response",
        }
    }
}

/// One generate-and-evaluate step.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub stage: Stage,
    /// 0 for the initial attempt, then 1, 2, ... for corrections.
    pub index: u32,
    pub generated_code: String,
    pub verdict: Verdict,
    pub log_dir: PathBuf,
}

/// Why the correction loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Passed,
    CorrectionDisabled,
    ExhaustedAttempts,
    OpaqueFail,
    NoResponse,
}

impl Termination {
    pub fn outcome(&self) -> Outcome {
        match self {
            Termination::Passed => Outcome::Correct,
            _ => Outcome::Incorrect,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Termination::Passed => "passed",
            Termination::CorrectionDisabled => "correction-disabled",
            Termination::ExhaustedAttempts => "exhausted-attempts",
            Termination::OpaqueFail => "opaque-fail",
            Termination::NoResponse => "no-response",
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final per-problem outcome, persisted as `result.txt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Correct,
    Incorrect,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Correct => "Correct",
            Outcome::Incorrect => "Incorrect",
        }
    }

    /// Parse the exact record literal (surrounding whitespace ignored).
    pub fn parse_record(text: &str) -> Option<Self> {
        match text.trim() {
            "Correct" => Some(Outcome::Correct),
            "Incorrect" => Some(Outcome::Incorrect),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{category}_{index:03}`, also the problem's directory name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProblemId {
    pub category: String,
    pub index: u32,
}

impl ProblemId {
    pub fn new(category: impl Into<String>, index: u32) -> Self {
        Self {
            category: category.into(),
            index,
        }
    }

    /// Parse a directory name; the category is everything before the last `_`.
    pub fn parse(dir_name: &str) -> Option<Self> {
        let (category, index) = dir_name.rsplit_once('_')?;
        if category.is_empty() || index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self {
            category: category.to_string(),
            index: index.parse().ok()?,
        })
    }
}

impl fmt::Display for ProblemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{:03}", self.category, self.index)
    }
}

/// One benchmark problem. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub id: ProblemId,
    pub prompt: String,
    pub code_context: String,
}

/// Immutable run parameters, persisted verbatim as `config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub experiment_name: String,
    pub categories: Vec<String>,
    pub sampling_fraction: f64,
    pub initial_strategy: Strategy,
    pub correction_strategy: Strategy,
    pub initial_model: LlmModel,
    pub correction_model: LlmModel,
    pub temperature: f32,
    pub top_p: f32,
    pub self_correction: bool,
    pub max_attempts: u32,
}

impl ExperimentConfig {
    /// Reject configurations the loop cannot run with.
    pub fn validate(&self) -> Result<(), SelfEvolveError> {
        let name = self.experiment_name.trim();
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(SelfEvolveError::Config(format!(
                "experiment name {:?} is not a valid directory name",
                self.experiment_name
            )));
        }
        if self.categories.is_empty() {
            return Err(SelfEvolveError::Config("no categories selected".into()));
        }
        if self.max_attempts < 1 {
            return Err(SelfEvolveError::Config(
                "max_attempts must be at least 1".into(),
            ));
        }
        if !(self.sampling_fraction > 0.0 && self.sampling_fraction <= 1.0) {
            return Err(SelfEvolveError::Config(format!(
                "sampling_fraction must be in (0, 1], got {}",
                self.sampling_fraction
            )));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(SelfEvolveError::Config(format!(
                "temperature must be in [0, 2], got {}",
                self.temperature
            )));
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(SelfEvolveError::Config(format!(
                "top_p must be in (0, 1], got {}",
                self.top_p
            )));
        }
        Ok(())
    }

    /// Strategy and model used for a given stage.
    pub fn stage_settings(&self, stage: Stage) -> (Strategy, LlmModel) {
        match stage {
            Stage::Initial => (self.initial_strategy, self.initial_model),
            Stage::Correction => (self.correction_strategy, self.correction_model),
        }
    }
}

/// Progress events emitted while an experiment runs.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    ProblemStart {
        problem: ProblemId,
    },
    /// A result record already existed; nothing was run.
    ProblemSkipped {
        problem: ProblemId,
        outcome: Outcome,
    },
    AttemptStart {
        problem: ProblemId,
        stage: Stage,
        index: u32,
        max_attempts: u32,
    },
    Retrieved {
        passage: String,
    },
    Hint {
        hint: String,
    },
    Generated {
        code: String,
    },
    AttemptEnd {
        problem: ProblemId,
        stage: Stage,
        index: u32,
        verdict: &'static str,
    },
    ProblemEnd {
        problem: ProblemId,
        outcome: Outcome,
        termination: Termination,
        attempts: u32,
    },
}

/// Shared progress sink.
pub type ProgressFn = std::sync::Arc<dyn Fn(ProgressEvent) + Send + Sync>;
