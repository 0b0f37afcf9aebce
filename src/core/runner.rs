// src/core/runner.rs — Run one problem to a persisted result, resuming if already done
//
// `result.txt` is the resume marker: when it exists the problem is skipped
// without any model or harness call. A fresh record is written with
// create-new semantics and is never overwritten.

use std::time::Duration;

use tokio::io::AsyncWriteExt;

use super::correction::CorrectionLoop;
use super::types::{Attempt, Outcome, Problem, ProblemId, ProgressEvent, ProgressFn, Termination};
use crate::infra::errors::SelfEvolveError;
use crate::infra::paths::ExperimentLayout;

/// Default pause after each freshly evaluated problem.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub struct ProblemReport {
    pub problem: ProblemId,
    pub outcome: Outcome,
    /// The record already existed and nothing was run.
    pub resumed: bool,
    /// Empty when resumed.
    pub attempts: Vec<Attempt>,
    pub termination: Option<Termination>,
}

pub struct ProblemRunner {
    correction: CorrectionLoop,
    layout: ExperimentLayout,
    cooldown: Duration,
    cooldown_on_resume: bool,
    progress: Option<ProgressFn>,
}

impl ProblemRunner {
    pub fn new(correction: CorrectionLoop, layout: ExperimentLayout) -> Self {
        Self {
            correction,
            layout,
            cooldown: DEFAULT_COOLDOWN,
            cooldown_on_resume: false,
            progress: None,
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Also pause after problems skipped on resume.
    pub fn with_cooldown_on_resume(mut self, enabled: bool) -> Self {
        self.cooldown_on_resume = enabled;
        self
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn layout(&self) -> &ExperimentLayout {
        &self.layout
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(ref cb) = self.progress {
            cb(event);
        }
    }

    pub async fn run(&self, problem: &Problem) -> Result<ProblemReport, SelfEvolveError> {
        let layout = self.layout.problem(&problem.id);
        let record_path = layout.result_record();

        match tokio::fs::read_to_string(&record_path).await {
            Ok(text) => {
                let outcome = Outcome::parse_record(&text).ok_or_else(|| {
                    SelfEvolveError::CorruptRecord {
                        path: record_path.clone(),
                        content: crate::util::clip(&text, 64).to_string(),
                    }
                })?;
                tracing::info!(problem = %problem.id, outcome = outcome.as_str(), "Already evaluated, skipping");
                self.emit(ProgressEvent::ProblemSkipped {
                    problem: problem.id.clone(),
                    outcome,
                });
                if self.cooldown_on_resume {
                    self.pause().await;
                }
                return Ok(ProblemReport {
                    problem: problem.id.clone(),
                    outcome,
                    resumed: true,
                    attempts: Vec::new(),
                    termination: None,
                });
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(SelfEvolveError::persistence(&record_path, e)),
        }

        self.emit(ProgressEvent::ProblemStart {
            problem: problem.id.clone(),
        });

        let report = self.correction.run(problem, &layout).await?;
        let outcome = report.termination.outcome();
        write_record(&record_path, outcome).await?;

        self.emit(ProgressEvent::ProblemEnd {
            problem: problem.id.clone(),
            outcome,
            termination: report.termination,
            attempts: report.attempts.len() as u32,
        });
        self.pause().await;

        Ok(ProblemReport {
            problem: problem.id.clone(),
            outcome,
            resumed: false,
            attempts: report.attempts,
            termination: Some(report.termination),
        })
    }

    async fn pause(&self) {
        if !self.cooldown.is_zero() {
            tokio::time::sleep(self.cooldown).await;
        }
    }
}

/// Create the record; fails if one already exists.
async fn write_record(path: &std::path::Path, outcome: Outcome) -> Result<(), SelfEvolveError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| SelfEvolveError::persistence(parent, e))?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(|e| SelfEvolveError::persistence(path, e))?;
    file.write_all(outcome.as_str().as_bytes())
        .await
        .map_err(|e| SelfEvolveError::persistence(path, e))?;
    file.flush()
        .await
        .map_err(|e| SelfEvolveError::persistence(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_record_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Numpy_000").join("result.txt");

        write_record(&path, Outcome::Correct).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Correct");

        let err = write_record(&path, Outcome::Incorrect).await.unwrap_err();
        assert!(matches!(
            err,
            SelfEvolveError::Persistence { ref source, .. }
                if source.kind() == std::io::ErrorKind::AlreadyExists
        ));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Correct");
    }
}
