// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::types::Strategy;
use crate::infra::errors::SelfEvolveError;
use crate::infra::paths;
use crate::provider::{LlmModel, ProviderKind};

/// Library categories of the benchmark, in run order.
pub const DEFAULT_CATEGORIES: [&str; 7] = [
    "Matplotlib",
    "Numpy",
    "Pandas",
    "Pytorch",
    "Scipy",
    "Sklearn",
    "Tensorflow",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub experiment: ExperimentSection,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub correction: CorrectionConfig,

    #[serde(default)]
    pub evaluator: EvaluatorConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub dataset: DatasetConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentSection {
    pub name: String,
    pub artifacts_dir: PathBuf,
    pub categories: Vec<String>,
    pub sampling_fraction: f64,
    pub seed: Option<u64>,
    /// Pause after each freshly evaluated problem.
    pub cooldown_secs: u64,
    /// Also pause after problems skipped on resume.
    pub cooldown_on_resume: bool,
}

impl Default for ExperimentSection {
    fn default() -> Self {
        Self {
            name: "default".into(),
            artifacts_dir: PathBuf::from("artifacts"),
            categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            sampling_fraction: 1.0,
            seed: None,
            cooldown_secs: 5,
            cooldown_on_resume: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub initial_strategy: Strategy,
    pub correction_strategy: Strategy,
    pub initial_model: LlmModel,
    pub correction_model: LlmModel,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: Option<u32>,
    /// Feedback longer than this many tokens is cut before prompting.
    pub feedback_token_budget: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            initial_strategy: Strategy::ZeroShot,
            correction_strategy: Strategy::ZeroShot,
            initial_model: LlmModel::AzureGpt35Turbo16k0613,
            correction_model: LlmModel::AzureGpt35Turbo16k0613,
            temperature: 0.9,
            top_p: 0.9,
            max_tokens: None,
            feedback_token_budget: 4096,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Off by default: a plain run is a single-attempt baseline.
    pub enabled: bool,
    /// Upper bound on generation attempts per problem, initial one included.
    pub max_attempts: u32,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Harness executable; receives one JSON request on stdin per evaluation.
    pub command: Option<String>,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            working_dir: None,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalBackend {
    #[default]
    None,
    Chroma,
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub backend: RetrievalBackend,
    pub chroma_url: String,
    pub collection: String,
    pub embedding_provider: ProviderKind,
    pub embedding_model: String,
    /// JSONL corpus for the `local` backend.
    pub corpus_path: Option<PathBuf>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            backend: RetrievalBackend::None,
            chroma_url: "http://localhost:8000".into(),
            collection: "stackoverflow".into(),
            embedding_provider: ProviderKind::OpenAI,
            embedding_model: "text-embedding-3-small".into(),
            corpus_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub openai_base_url: Option<String>,
    pub azure_api_version: Option<String>,
    pub aws_region: Option<String>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 120,
            max_retries: 8,
            openai_base_url: None,
            azure_api_version: None,
            aws_region: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub path: PathBuf,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/ds1000.jsonl"),
        }
    }
}

impl Config {
    /// Load config from the first file found in the lookup order, falling back to defaults.
    pub fn load() -> Result<Self, SelfEvolveError> {
        match paths::find_config_file() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, SelfEvolveError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SelfEvolveError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            SelfEvolveError::Config(format!("invalid config {}: {}", path.display(), e))
        })?;
        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }
}
