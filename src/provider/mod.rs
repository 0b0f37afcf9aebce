// src/provider/mod.rs — Model provider layer

pub mod azure;
pub mod bedrock;
pub mod google;
pub mod openai;
pub mod resolver;
pub mod retry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::infra::errors::SelfEvolveError;

/// Core trait that all model providers implement.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, SelfEvolveError>;

    async fn embed(&self, model: &str, texts: &[&str]) -> Result<Vec<Vec<f32>>, SelfEvolveError>;
}

#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub system: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub usage: TokenUsage,
    pub stop_reason: StopReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.input_tokens += rhs.input_tokens;
        self.output_tokens += rhs.output_tokens;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    ContentFilter,
    #[default]
    Unknown,
}

// ─── Model catalogue ────────────────────────────────────────────

/// Backend family a model is served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Azure,
    OpenAI,
    Bedrock,
    Google,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Azure => "azure",
            ProviderKind::OpenAI => "openai",
            ProviderKind::Bedrock => "bedrock",
            ProviderKind::Google => "google",
        }
    }

    /// Environment variables that must be set to build this provider.
    pub fn required_env(&self) -> &'static [&'static str] {
        match self {
            ProviderKind::Azure => &["AZURE_API_KEY", "AZURE_API_BASE"],
            ProviderKind::OpenAI => &["OPENAI_API_KEY"],
            ProviderKind::Bedrock => &["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY"],
            ProviderKind::Google => &["GEMINI_API_KEY"],
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of models an experiment may use.
///
/// Each identifier is `{backend}-{model name}`; the backend prefix selects the
/// provider and the remainder is sent as the model (or deployment) name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LlmModel {
    AzureGpt35Turbo16k0613,
    AzureGpt432k0613,
    AzureGpt4Turbo20240409,
    OpenAIGpt35Turbo16k0613,
    OpenAIGpt432k0613,
    OpenAIGpt4Turbo,
    OpenAIGpt4o,
    BedrockClaudeV21,
    BedrockClaude3Sonnet,
    BedrockLlama370b,
    BedrockMistralLarge,
    BedrockMixtral8x7b,
    GeminiFlash15,
    GeminiPro15,
}

impl LlmModel {
    pub const ALL: [LlmModel; 14] = [
        LlmModel::AzureGpt35Turbo16k0613,
        LlmModel::AzureGpt432k0613,
        LlmModel::AzureGpt4Turbo20240409,
        LlmModel::OpenAIGpt35Turbo16k0613,
        LlmModel::OpenAIGpt432k0613,
        LlmModel::OpenAIGpt4Turbo,
        LlmModel::OpenAIGpt4o,
        LlmModel::BedrockClaudeV21,
        LlmModel::BedrockClaude3Sonnet,
        LlmModel::BedrockLlama370b,
        LlmModel::BedrockMistralLarge,
        LlmModel::BedrockMixtral8x7b,
        LlmModel::GeminiFlash15,
        LlmModel::GeminiPro15,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LlmModel::AzureGpt35Turbo16k0613 => "azure-gpt-35-turbo-16k-0613",
            LlmModel::AzureGpt432k0613 => "azure-gpt-4-32k-0613",
            LlmModel::AzureGpt4Turbo20240409 => "azure-gpt-4-turbo-2024-04-09",
            LlmModel::OpenAIGpt35Turbo16k0613 => "openai-gpt-3.5-turbo-16k-0613",
            LlmModel::OpenAIGpt432k0613 => "openai-gpt-4-32k-0613",
            LlmModel::OpenAIGpt4Turbo => "openai-gpt-4-turbo",
            LlmModel::OpenAIGpt4o => "openai-gpt-4o",
            LlmModel::BedrockClaudeV21 => "bedrock-anthropic.claude-v2:1",
            LlmModel::BedrockClaude3Sonnet => "bedrock-anthropic.claude-3-sonnet-20240229-v1:0",
            LlmModel::BedrockLlama370b => "bedrock-meta.llama3-70b-instruct-v1:0",
            LlmModel::BedrockMistralLarge => "bedrock-mistral.mistral-large-2402-v1:0",
            LlmModel::BedrockMixtral8x7b => "bedrock-mistral.mistral-8x7b-instruct-v0:1",
            LlmModel::GeminiFlash15 => "gemini-1.5-flash",
            LlmModel::GeminiPro15 => "gemini-1.5-pro",
        }
    }

    pub fn provider(&self) -> ProviderKind {
        match self {
            LlmModel::AzureGpt35Turbo16k0613
            | LlmModel::AzureGpt432k0613
            | LlmModel::AzureGpt4Turbo20240409 => ProviderKind::Azure,
            LlmModel::OpenAIGpt35Turbo16k0613
            | LlmModel::OpenAIGpt432k0613
            | LlmModel::OpenAIGpt4Turbo
            | LlmModel::OpenAIGpt4o => ProviderKind::OpenAI,
            LlmModel::BedrockClaudeV21
            | LlmModel::BedrockClaude3Sonnet
            | LlmModel::BedrockLlama370b
            | LlmModel::BedrockMistralLarge
            | LlmModel::BedrockMixtral8x7b => ProviderKind::Bedrock,
            LlmModel::GeminiFlash15 | LlmModel::GeminiPro15 => ProviderKind::Google,
        }
    }

    /// Model name as the backend expects it (prefix stripped).
    pub fn model_name(&self) -> &'static str {
        let id = self.as_str();
        match self.provider() {
            ProviderKind::Azure => &id["azure-".len()..],
            ProviderKind::OpenAI => &id["openai-".len()..],
            ProviderKind::Bedrock => &id["bedrock-".len()..],
            ProviderKind::Google => id,
        }
    }

    /// Model name handed to the BPE tokenizer for token accounting.
    pub fn tokenizer_model(&self) -> &'static str {
        match self {
            LlmModel::AzureGpt35Turbo16k0613 | LlmModel::OpenAIGpt35Turbo16k0613 => {
                "gpt-3.5-turbo"
            }
            LlmModel::OpenAIGpt4o => "gpt-4o",
            // Everything else is counted with cl100k_base.
            _ => "gpt-4",
        }
    }
}

impl fmt::Display for LlmModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmModel {
    type Err = SelfEvolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LlmModel::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| SelfEvolveError::UnknownValue {
                kind: "model",
                value: s.to_string(),
            })
    }
}

impl Serialize for LlmModel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LlmModel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl clap::ValueEnum for LlmModel {
    fn value_variants<'a>() -> &'a [Self] {
        &LlmModel::ALL
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.as_str()))
    }
}
