// src/core/generator.rs — One code-generation step: optional hint, then code
//
// A chain-of-thought step issues a hint request before the code request; the
// initial hint request is grounded on the top retrieved passage. Each request
// that gets an answer leaves a log.json under the attempt directory.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use super::extractor::CodeExtractor;
use super::prompts::{PromptBuilder, PromptVars};
use super::tokens::Tokenizer;
use super::types::{Problem, ProblemId, ProgressEvent, ProgressFn, Stage, Strategy, Task};
use crate::infra::errors::SelfEvolveError;
use crate::infra::paths;
use crate::provider::{ChatRequest, ChatResponse, LlmModel, Message, ModelProvider, Role, StopReason, TokenUsage};
use crate::retrieval::{NoRetrieval, Retriever};

/// Feedback beyond this many tokens is cut before prompting.
pub const DEFAULT_FEEDBACK_BUDGET: usize = 4096;

/// Sampling parameters forwarded to every request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: Option<u32>,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.9,
            top_p: 0.9,
            max_tokens: None,
        }
    }
}

/// Inputs for one generation step.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub stage: Stage,
    pub strategy: Strategy,
    pub problem: &'a Problem,
    /// Code from the previous attempt; empty on the initial stage.
    pub prior_code: &'a str,
    /// Harness feedback on `prior_code`; empty on the initial stage.
    pub feedback: &'a str,
    pub log_dir: &'a Path,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedCode {
    /// Extracted code, or `""` when the answer held no valid candidate.
    pub code: String,
    pub hint: Option<String>,
    pub passage: Option<String>,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Answer(GeneratedCode),
    /// A model request failed or came back empty.
    NoResponse { reason: String },
}

/// Contents of a request's log.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationLog {
    pub model: LlmModel,
    pub stage: Stage,
    pub task: Task,
    pub created_at: DateTime<Utc>,
    pub prompt_messages: Vec<Message>,
    pub prompt_token_count: u32,
    pub completion_message: String,
    pub completion_token_count: u32,
    pub stop_reason: StopReason,
}

enum Reply {
    Answer(ChatResponse),
    Silent(String),
}

pub struct GenerationClient {
    provider: Arc<dyn ModelProvider>,
    model: LlmModel,
    sampling: SamplingParams,
    prompts: Arc<PromptBuilder>,
    retriever: Arc<dyn Retriever>,
    extractor: Arc<CodeExtractor>,
    tokenizer: Tokenizer,
    feedback_budget: usize,
    progress: Option<ProgressFn>,
}

impl GenerationClient {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        model: LlmModel,
        prompts: Arc<PromptBuilder>,
    ) -> Result<Self, SelfEvolveError> {
        Ok(Self {
            provider,
            model,
            sampling: SamplingParams::default(),
            prompts,
            retriever: Arc::new(NoRetrieval),
            extractor: Arc::new(CodeExtractor::default()),
            tokenizer: Tokenizer::for_model(model.tokenizer_model())?,
            feedback_budget: DEFAULT_FEEDBACK_BUDGET,
            progress: None,
        })
    }

    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = retriever;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<CodeExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_feedback_budget(mut self, tokens: usize) -> Self {
        self.feedback_budget = tokens;
        self
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn model(&self) -> LlmModel {
        self.model
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(ref cb) = self.progress {
            cb(event);
        }
    }

    pub async fn generate(
        &self,
        request: GenerationRequest<'_>,
    ) -> Result<GenerationOutcome, SelfEvolveError> {
        let feedback = self.tokenizer.truncate(request.feedback, self.feedback_budget);
        if feedback.len() < request.feedback.len() {
            tracing::debug!(
                kept_bytes = feedback.len(),
                original_bytes = request.feedback.len(),
                "Truncated feedback to {} tokens",
                self.feedback_budget
            );
        }

        let code_template = self.prompts.build(
            request.stage,
            request.strategy,
            Task::CodeGeneration,
            Some(feedback),
        )?;

        let mut usage = TokenUsage::default();
        let mut passage = None;
        let mut hint = None;

        if request.strategy == Strategy::ChainOfThought {
            if request.stage == Stage::Initial {
                let found = self.retrieve_passage(&request.problem.prompt).await;
                self.emit(ProgressEvent::Retrieved {
                    passage: found.clone(),
                });
                passage = Some(found);
            }

            let hint_template = self.prompts.build(
                request.stage,
                request.strategy,
                Task::CotGeneration,
                Some(feedback),
            )?;
            let messages = self.prompts.render(
                &hint_template,
                &PromptVars {
                    problem: &request.problem.prompt,
                    code_context: &request.problem.code_context,
                    post: passage.as_deref().unwrap_or(""),
                    generated_code: request.prior_code,
                    feedback,
                    hint: "",
                },
            )?;

            match self
                .request(&request.problem.id, request.stage, Task::CotGeneration, messages, request.log_dir)
                .await?
            {
                Reply::Answer(resp) => {
                    usage += resp.usage;
                    self.emit(ProgressEvent::Hint {
                        hint: resp.content.clone(),
                    });
                    hint = Some(resp.content);
                }
                Reply::Silent(reason) => return Ok(GenerationOutcome::NoResponse { reason }),
            }
        }

        let messages = self.prompts.render(
            &code_template,
            &PromptVars {
                problem: &request.problem.prompt,
                code_context: &request.problem.code_context,
                post: "",
                generated_code: request.prior_code,
                feedback,
                hint: hint.as_deref().unwrap_or(""),
            },
        )?;

        let resp = match self
            .request(&request.problem.id, request.stage, Task::CodeGeneration, messages, request.log_dir)
            .await?
        {
            Reply::Answer(resp) => resp,
            Reply::Silent(reason) => return Ok(GenerationOutcome::NoResponse { reason }),
        };
        usage += resp.usage;

        let code = self.extractor.extract(&resp.content);
        self.emit(ProgressEvent::Generated { code: code.clone() });

        Ok(GenerationOutcome::Answer(GeneratedCode {
            code,
            hint,
            passage,
            usage,
        }))
    }

    /// Top-1 passage for `query`, or `""` if the lookup fails.
    async fn retrieve_passage(&self, query: &str) -> String {
        match self.retriever.retrieve(query, 1).await {
            Ok(passages) => passages.into_iter().next().unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Retrieval failed, continuing without a passage: {}", e);
                String::new()
            }
        }
    }

    /// Send one request and log it. Provider errors become `Reply::Silent`;
    /// only persistence errors propagate.
    async fn request(
        &self,
        problem: &ProblemId,
        stage: Stage,
        task: Task,
        messages: Vec<Message>,
        log_dir: &Path,
    ) -> Result<Reply, SelfEvolveError> {
        let system = messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.clone());
        let chat = ChatRequest {
            model: self.model.model_name().to_string(),
            messages: messages
                .iter()
                .filter(|m| m.role != Role::System)
                .cloned()
                .collect(),
            max_tokens: self.sampling.max_tokens,
            temperature: Some(self.sampling.temperature),
            top_p: Some(self.sampling.top_p),
            system,
        };

        let span = tracing::info_span!(
            "model_request",
            problem = %problem,
            stage = %stage,
            task = task.log_subdir(),
            model = self.model.as_str()
        );
        let resp = match self.provider.chat(chat).instrument(span).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(
                    problem = %problem,
                    %stage,
                    model = self.model.as_str(),
                    task = task.log_subdir(),
                    "Model request failed, recording no response: {}",
                    e
                );
                return Ok(Reply::Silent(e.to_string()));
            }
        };

        self.write_log(stage, task, messages, &resp, log_dir).await?;

        // An empty answer is still an answer: the hint stays empty and an
        // empty code candidate goes through the invalid-candidate path.
        if resp.content.trim().is_empty() {
            tracing::debug!(model = self.model.as_str(), task = task.log_subdir(), "Empty completion");
        }
        Ok(Reply::Answer(resp))
    }

    async fn write_log(
        &self,
        stage: Stage,
        task: Task,
        prompt_messages: Vec<Message>,
        resp: &ChatResponse,
        log_dir: &Path,
    ) -> Result<(), SelfEvolveError> {
        let prompt_token_count = match resp.usage.input_tokens {
            0 => prompt_messages
                .iter()
                .map(|m| self.tokenizer.count(&m.content) as u32)
                .sum(),
            n => n,
        };
        let completion_token_count = match resp.usage.output_tokens {
            0 => self.tokenizer.count(&resp.content) as u32,
            n => n,
        };
        let log = GenerationLog {
            model: self.model,
            stage,
            task,
            created_at: Utc::now(),
            prompt_messages,
            prompt_token_count,
            completion_message: resp.content.clone(),
            completion_token_count,
            stop_reason: resp.stop_reason.clone(),
        };

        let path = paths::request_log_file(log_dir, task);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SelfEvolveError::persistence(parent, e))?;
        }
        let body = serde_json::to_string_pretty(&log)?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| SelfEvolveError::persistence(&path, e))?;
        Ok(())
    }
}
