// src/provider/google.rs — Google Generative AI (Gemini) provider

use async_trait::async_trait;

use super::openai::{check_status, send_error};
use super::{ChatRequest, ChatResponse, ModelProvider, Role, StopReason, TokenUsage};
use crate::infra::errors::SelfEvolveError;

pub struct GoogleProvider {
    api_key: String,
    client: reqwest::Client,
}

impl GoogleProvider {
    pub fn new(api_key: String, client: reqwest::Client) -> Self {
        Self { api_key, client }
    }

    fn base_url(&self) -> &str {
        "https://generativelanguage.googleapis.com/v1beta"
    }

    /// Build the Gemini request body from a ChatRequest.
    fn build_request_body(&self, request: &ChatRequest) -> serde_json::Value {
        let mut contents: Vec<serde_json::Value> = Vec::new();

        for m in &request.messages {
            let role = match m.role {
                Role::User => "user",
                Role::Assistant => "model",
                Role::System => continue,
            };

            contents.push(serde_json::json!({
                "role": role,
                "parts": [{ "text": m.content }],
            }));
        }

        let mut body = serde_json::json!({ "contents": contents });

        if let Some(ref system) = request.system {
            body["system_instruction"] = serde_json::json!({
                "parts": [{ "text": system }],
            });
        }

        let mut gen_config = serde_json::Map::new();
        if let Some(max_tokens) = request.max_tokens {
            gen_config.insert("maxOutputTokens".into(), serde_json::json!(max_tokens));
        }
        if let Some(temp) = request.temperature {
            gen_config.insert("temperature".into(), serde_json::json!(temp));
        }
        if let Some(top_p) = request.top_p {
            gen_config.insert("topP".into(), serde_json::json!(top_p));
        }
        if !gen_config.is_empty() {
            body["generationConfig"] = serde_json::Value::Object(gen_config);
        }

        body
    }
}

#[async_trait]
impl ModelProvider for GoogleProvider {
    fn id(&self) -> &str {
        "google"
    }

    fn name(&self) -> &str {
        "Google"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, SelfEvolveError> {
        let body = self.build_request_body(&request);
        let url = format!("{}/models/{}:generateContent", self.base_url(), request.model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error("google", e))?;

        let response = check_status("google", response).await?;

        let resp: serde_json::Value =
            response.json().await.map_err(|e| SelfEvolveError::Provider {
                provider: "google".into(),
                message: format!("Failed to parse response: {}", e),
                retriable: false,
            })?;

        let content = resp["candidates"][0]["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let usage = TokenUsage {
            input_tokens: resp["usageMetadata"]["promptTokenCount"]
                .as_u64()
                .unwrap_or(0) as u32,
            output_tokens: resp["usageMetadata"]["candidatesTokenCount"]
                .as_u64()
                .unwrap_or(0) as u32,
        };

        let stop_reason = match resp["candidates"][0]["finishReason"].as_str() {
            Some("STOP") => StopReason::EndTurn,
            Some("MAX_TOKENS") => StopReason::MaxTokens,
            Some("SAFETY") | Some("RECITATION") => StopReason::ContentFilter,
            _ => StopReason::Unknown,
        };

        Ok(ChatResponse {
            content,
            usage,
            stop_reason,
        })
    }

    async fn embed(&self, model: &str, texts: &[&str]) -> Result<Vec<Vec<f32>>, SelfEvolveError> {
        let model_path = format!("models/{}", model.trim_start_matches("models/"));
        let requests: Vec<serde_json::Value> = texts
            .iter()
            .map(|text| {
                serde_json::json!({
                    "model": model_path,
                    "content": { "parts": [{ "text": text }] },
                })
            })
            .collect();

        let url = format!("{}/{}:batchEmbedContents", self.base_url(), model_path);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&serde_json::json!({ "requests": requests }))
            .send()
            .await
            .map_err(|e| send_error("google", e))?;

        let response = check_status("google", response).await?;

        let resp: serde_json::Value =
            response.json().await.map_err(|e| SelfEvolveError::Provider {
                provider: "google".into(),
                message: format!("Failed to parse embedding response: {}", e),
                retriable: false,
            })?;

        let embeddings = resp["embeddings"]
            .as_array()
            .map(|all| {
                all.iter()
                    .map(|e| {
                        e["values"]
                            .as_array()
                            .map(|v| v.iter().map(|x| x.as_f64().unwrap_or(0.0) as f32).collect())
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(embeddings)
    }
}
