// src/evaluator/harness.rs — External test harness over a JSON stdin/stdout protocol
//
// One child process per evaluation. The request is written to stdin as a
// single JSON object; the harness answers with one JSON object on stdout:
//
//   {"verdict": "pass"}
//   {"verdict": "fail", "code": "...", "feedback": "..."}
//   {"verdict": "fail"}                       (nothing to act on)

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::Evaluator;
use crate::core::types::{Problem, Verdict};
use crate::infra::config::EvaluatorConfig;
use crate::infra::errors::SelfEvolveError;

#[derive(Debug, Serialize)]
struct HarnessRequest<'a> {
    problem_id: String,
    category: &'a str,
    index: u32,
    prompt: &'a str,
    code_context: &'a str,
    code: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "verdict", rename_all = "lowercase")]
enum HarnessReply {
    Pass,
    Fail {
        #[serde(default)]
        code: Option<String>,
        #[serde(default)]
        feedback: Option<String>,
    },
}

pub struct HarnessEvaluator {
    program: PathBuf,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    timeout: Duration,
}

impl HarnessEvaluator {
    /// Resolve `command` on PATH (or as a path) and keep its arguments.
    pub fn new(command: &str, args: Vec<String>) -> Result<Self, SelfEvolveError> {
        let program = which::which(command).map_err(|e| {
            SelfEvolveError::Config(format!("evaluator command {command:?} not found: {e}"))
        })?;
        Ok(Self {
            program,
            args,
            working_dir: None,
            timeout: Duration::from_secs(120),
        })
    }

    pub fn from_config(config: &EvaluatorConfig) -> Result<Self, SelfEvolveError> {
        let command = config.command.as_deref().ok_or_else(|| {
            SelfEvolveError::Config("evaluator.command is not set".into())
        })?;
        let mut evaluator = Self::new(command, config.args.clone())?
            .with_timeout(Duration::from_secs(config.timeout_secs));
        if let Some(ref dir) = config.working_dir {
            evaluator = evaluator.with_working_dir(dir.clone());
        }
        Ok(evaluator)
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Evaluator for HarnessEvaluator {
    async fn evaluate(&self, problem: &Problem, code: &str) -> Result<Verdict, SelfEvolveError> {
        let payload = serde_json::to_vec(&HarnessRequest {
            problem_id: problem.id.to_string(),
            category: &problem.id.category,
            index: problem.id.index,
            prompt: &problem.prompt,
            code_context: &problem.code_context,
            code,
        })?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }

        tracing::debug!(problem = %problem.id, program = %self.program.display(), "Running harness");

        let mut child = cmd.spawn().map_err(|e| {
            SelfEvolveError::Evaluator(format!("cannot start {}: {e}", self.program.display()))
        })?;

        // Fed from its own task so a harness that never drains stdin still
        // hits the timeout. Dropping the handle closes the pipe.
        if let Some(mut stdin) = child.stdin.take() {
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&payload).await {
                    tracing::debug!("Harness closed stdin early: {}", e);
                }
            });
        }

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| SelfEvolveError::Evaluator(e.to_string()))?,
            Err(_) => {
                return Err(SelfEvolveError::Evaluator(format!(
                    "harness timed out after {}s on {}",
                    self.timeout.as_secs_f32(),
                    problem.id
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SelfEvolveError::Evaluator(format!(
                "harness exited with {} on {}: {}",
                output.status,
                problem.id,
                crate::util::preview(stderr.trim(), 500)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let verdict = parse_reply(&stdout, code)?;
        tracing::debug!(problem = %problem.id, verdict = verdict.label(), "Harness verdict");
        Ok(verdict)
    }
}

/// Parse harness stdout. The whole output is tried first, then its last line,
/// so harnesses may print diagnostics before the verdict.
fn parse_reply(stdout: &str, submitted: &str) -> Result<Verdict, SelfEvolveError> {
    let trimmed = stdout.trim();
    let reply: HarnessReply = match serde_json::from_str(trimmed) {
        Ok(reply) => reply,
        Err(first) => trimmed
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .and_then(|l| serde_json::from_str(l.trim()).ok())
            .ok_or_else(|| {
                SelfEvolveError::Evaluator(format!(
                    "unreadable harness reply ({first}): {:?}",
                    crate::util::preview(trimmed, 200)
                ))
            })?,
    };

    Ok(match reply {
        HarnessReply::Pass => Verdict::Pass,
        HarnessReply::Fail {
            code,
            feedback: Some(feedback),
        } if !feedback.trim().is_empty() => Verdict::Fail {
            rewritten_code: code.unwrap_or_else(|| submitted.to_string()),
            feedback,
        },
        HarnessReply::Fail { .. } => Verdict::OpaqueFail,
    })
}
