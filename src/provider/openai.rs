// src/provider/openai.rs — OpenAI Chat API provider

use async_trait::async_trait;

use super::{ChatRequest, ChatResponse, ModelProvider, StopReason, TokenUsage};
use crate::infra::errors::SelfEvolveError;

pub struct OpenAIProvider {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
}

impl OpenAIProvider {
    pub fn new(api_key: String, client: reqwest::Client) -> Self {
        Self::with_base_url(api_key, "https://api.openai.com/v1".into(), client)
    }

    pub fn with_base_url(api_key: String, base_url: String, client: reqwest::Client) -> Self {
        Self {
            api_key,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Chat Completions request body, shared with the Azure deployment API.
pub(crate) fn build_chat_body(request: &ChatRequest, include_model: bool) -> serde_json::Value {
    let mut msgs = Vec::new();

    if let Some(system) = &request.system {
        msgs.push(serde_json::json!({
            "role": "system",
            "content": system,
        }));
    }

    for m in &request.messages {
        msgs.push(serde_json::json!({
            "role": m.role.as_str(),
            "content": m.content,
        }));
    }

    let mut body = serde_json::json!({ "messages": msgs });

    if include_model {
        body["model"] = serde_json::json!(request.model);
    }
    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = serde_json::json!(max_tokens);
    }
    if let Some(temp) = request.temperature {
        body["temperature"] = serde_json::json!(temp);
    }
    if let Some(top_p) = request.top_p {
        body["top_p"] = serde_json::json!(top_p);
    }

    body
}

/// Map a transport error onto the provider error taxonomy.
pub(crate) fn send_error(provider: &str, e: reqwest::Error) -> SelfEvolveError {
    SelfEvolveError::Provider {
        provider: provider.into(),
        message: e.to_string(),
        retriable: e.is_timeout() || e.is_connect(),
    }
}

/// Turn a non-success HTTP status into an error; pass the response through otherwise.
pub(crate) async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, SelfEvolveError> {
    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after_ms = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(|secs| secs * 1000)
            .unwrap_or(5000);
        return Err(SelfEvolveError::RateLimited {
            provider: provider.into(),
            retry_after_ms,
        });
    }

    if !status.is_success() {
        let error_body = response.text().await.unwrap_or_default();
        return Err(SelfEvolveError::Provider {
            provider: provider.into(),
            message: format!("HTTP {}: {}", status, error_body),
            retriable: status.is_server_error(),
        });
    }

    Ok(response)
}

pub(crate) fn parse_chat_response(resp: &serde_json::Value) -> ChatResponse {
    let choice = &resp["choices"][0];
    let content = choice["message"]["content"]
        .as_str()
        .unwrap_or("")
        .to_string();

    let usage = TokenUsage {
        input_tokens: resp["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        output_tokens: resp["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
    };

    let stop_reason = match choice["finish_reason"].as_str() {
        Some("stop") => StopReason::EndTurn,
        Some("length") => StopReason::MaxTokens,
        Some("content_filter") => StopReason::ContentFilter,
        _ => StopReason::Unknown,
    };

    ChatResponse {
        content,
        usage,
        stop_reason,
    }
}

pub(crate) fn parse_embeddings(resp: &serde_json::Value) -> Vec<Vec<f32>> {
    resp["data"]
        .as_array()
        .map(|data| {
            data.iter()
                .map(|d| {
                    d["embedding"]
                        .as_array()
                        .map(|v| v.iter().map(|x| x.as_f64().unwrap_or(0.0) as f32).collect())
                        .unwrap_or_default()
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl ModelProvider for OpenAIProvider {
    fn id(&self) -> &str {
        "openai"
    }

    fn name(&self) -> &str {
        "OpenAI"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, SelfEvolveError> {
        let body = build_chat_body(&request, true);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error("openai", e))?;

        let response = check_status("openai", response).await?;

        let resp: serde_json::Value =
            response.json().await.map_err(|e| SelfEvolveError::Provider {
                provider: "openai".into(),
                message: format!("Failed to parse response: {}", e),
                retriable: false,
            })?;

        Ok(parse_chat_response(&resp))
    }

    async fn embed(&self, model: &str, texts: &[&str]) -> Result<Vec<Vec<f32>>, SelfEvolveError> {
        let body = serde_json::json!({
            "model": model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error("openai", e))?;

        let response = check_status("openai", response).await?;

        let resp: serde_json::Value =
            response.json().await.map_err(|e| SelfEvolveError::Provider {
                provider: "openai".into(),
                message: format!("Failed to parse embedding response: {}", e),
                retriable: false,
            })?;

        Ok(parse_embeddings(&resp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Message;

    fn sample_request() -> ChatRequest {
        ChatRequest {
            model: "gpt-4o".into(),
            messages: vec![Message::user("Write a function")],
            system: Some("You are a Python expert.".into()),
            max_tokens: Some(512),
            temperature: Some(0.9),
            top_p: Some(0.9),
        }
    }

    #[test]
    fn test_chat_body_includes_sampling() {
        let body = build_chat_body(&sample_request(), true);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "Write a function");
        assert_eq!(body["max_tokens"], 512);
        assert!((body["top_p"].as_f64().unwrap() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_chat_body_without_model() {
        let body = build_chat_body(&sample_request(), false);
        assert!(body.get("model").is_none());
    }

    #[test]
    fn test_parse_chat_response() {
        let resp = serde_json::json!({
            "choices": [{
                "message": {"role": "assistant", "content": "```python\nx = 1\n```"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 7}
        });
        let parsed = parse_chat_response(&resp);
        assert_eq!(parsed.content, "```python\nx = 1\n```");
        assert_eq!(parsed.usage.total(), 19);
        assert_eq!(parsed.stop_reason, StopReason::EndTurn);
    }

    #[test]
    fn test_parse_chat_response_null_content() {
        let resp = serde_json::json!({
            "choices": [{"message": {"content": null}, "finish_reason": "content_filter"}]
        });
        let parsed = parse_chat_response(&resp);
        assert!(parsed.content.is_empty());
        assert_eq!(parsed.stop_reason, StopReason::ContentFilter);
    }

    #[test]
    fn test_parse_embeddings() {
        let resp = serde_json::json!({
            "data": [{"embedding": [0.5, 0.25]}, {"embedding": [1.0]}]
        });
        let e = parse_embeddings(&resp);
        assert_eq!(e, vec![vec![0.5, 0.25], vec![1.0]]);
    }
}
