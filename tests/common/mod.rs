// tests/common/mod.rs — Mock collaborators shared by the integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use selfevolve::core::correction::{CorrectionLoop, LoopSettings};
use selfevolve::core::generator::GenerationClient;
use selfevolve::core::prompts::PromptBuilder;
use selfevolve::core::types::{Problem, ProblemId, Strategy, Verdict};
use selfevolve::evaluator::Evaluator;
use selfevolve::infra::errors::SelfEvolveError;
use selfevolve::provider::{ChatRequest, ChatResponse, LlmModel, ModelProvider, StopReason, TokenUsage};
use selfevolve::retrieval::Retriever;

/// Replays scripted replies, then answers `result = <n>` in a python fence.
pub struct MockProvider {
    script: Mutex<VecDeque<Result<String, SelfEvolveError>>>,
    requests: Mutex<Vec<ChatRequest>>,
    calls: AtomicU32,
}

impl MockProvider {
    pub fn new() -> Arc<Self> {
        Self::scripted(vec![])
    }

    pub fn scripted(script: Vec<Result<String, SelfEvolveError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
        })
    }

    /// Every request fails as if the backend were down.
    pub fn failing(times: usize) -> Arc<Self> {
        Self::scripted(
            (0..times)
                .map(|_| {
                    Err(SelfEvolveError::Provider {
                        provider: "mock".into(),
                        message: "503 Service Unavailable".into(),
                        retriable: false,
                    })
                })
                .collect(),
        )
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn id(&self) -> &str {
        "mock"
    }

    fn name(&self) -> &str {
        "Mock Provider"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, SelfEvolveError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        let scripted = self.script.lock().unwrap().pop_front();
        let content = match scripted {
            Some(reply) => reply?,
            None => format!("```python\nresult = {}\n```", n),
        };
        Ok(ChatResponse {
            content,
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 20,
            },
            stop_reason: StopReason::EndTurn,
        })
    }

    async fn embed(&self, _model: &str, texts: &[&str]) -> Result<Vec<Vec<f32>>, SelfEvolveError> {
        Ok(texts.iter().map(|_| vec![0.1, 0.2, 0.3]).collect())
    }
}

/// Hands out verdicts in order and records the code it was shown.
pub struct ScriptedEvaluator {
    verdicts: Mutex<VecDeque<Verdict>>,
    seen: Mutex<Vec<String>>,
}

impl ScriptedEvaluator {
    pub fn new(verdicts: Vec<Verdict>) -> Arc<Self> {
        Arc::new(Self {
            verdicts: Mutex::new(verdicts.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Evaluator for ScriptedEvaluator {
    async fn evaluate(&self, _problem: &Problem, code: &str) -> Result<Verdict, SelfEvolveError> {
        self.seen.lock().unwrap().push(code.to_string());
        self.verdicts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| SelfEvolveError::Evaluator("no verdict scripted".into()))
    }
}

/// Records every query and returns one fixed passage.
pub struct RecordingRetriever {
    pub queries: Mutex<Vec<(String, usize)>>,
}

impl RecordingRetriever {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            queries: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Retriever for RecordingRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>, SelfEvolveError> {
        self.queries.lock().unwrap().push((query.to_string(), k));
        Ok(vec!["Q: reverse a numpy array? A: use a[::-1]".into()])
    }
}

pub fn fail(code: &str, feedback: &str) -> Verdict {
    Verdict::Fail {
        rewritten_code: code.into(),
        feedback: feedback.into(),
    }
}

pub fn problem(category: &str, index: u32) -> Problem {
    Problem {
        id: ProblemId::new(category, index),
        prompt: format!("Problem {category} #{index}: reverse `a` and store it in `result`."),
        code_context: "import numpy as np\na = np.arange(5)\n[insert]\nprint(result)".into(),
    }
}

pub fn settings(self_correction: bool, max_attempts: u32) -> LoopSettings {
    LoopSettings {
        initial_strategy: Strategy::ZeroShot,
        correction_strategy: Strategy::ZeroShot,
        self_correction,
        max_attempts,
    }
}

pub fn client(provider: Arc<MockProvider>) -> GenerationClient {
    GenerationClient::new(
        provider,
        LlmModel::OpenAIGpt4o,
        Arc::new(PromptBuilder::new().unwrap()),
    )
    .unwrap()
}

/// A loop whose two stages share one provider.
pub fn correction_loop(
    provider: Arc<MockProvider>,
    evaluator: Arc<ScriptedEvaluator>,
    settings: LoopSettings,
) -> CorrectionLoop {
    CorrectionLoop::new(
        Arc::new(client(provider.clone())),
        Arc::new(client(provider)),
        evaluator,
        settings,
    )
}

pub fn correction_dirs(problem_root: &Path) -> Vec<String> {
    let dir = problem_root.join("logs").join("correction");
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}
