// src/provider/azure.rs — Azure OpenAI deployment provider
//
// Same wire format as OpenAI Chat Completions, but routed by deployment name
// and authenticated with an `api-key` header.

use async_trait::async_trait;

use super::openai::{build_chat_body, check_status, parse_chat_response, parse_embeddings, send_error};
use super::{ChatRequest, ChatResponse, ModelProvider};
use crate::infra::errors::SelfEvolveError;

pub const DEFAULT_API_VERSION: &str = "2024-02-01";

pub struct AzureOpenAIProvider {
    api_key: String,
    api_base: String,
    api_version: String,
    client: reqwest::Client,
}

impl AzureOpenAIProvider {
    pub fn new(
        api_key: String,
        api_base: String,
        api_version: Option<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_version: api_version.unwrap_or_else(|| DEFAULT_API_VERSION.into()),
            client,
        }
    }

    fn deployment_url(&self, deployment: &str, operation: &str) -> String {
        format!(
            "{}/openai/deployments/{}/{}?api-version={}",
            self.api_base, deployment, operation, self.api_version
        )
    }
}

#[async_trait]
impl ModelProvider for AzureOpenAIProvider {
    fn id(&self) -> &str {
        "azure"
    }

    fn name(&self) -> &str {
        "Azure OpenAI"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, SelfEvolveError> {
        let body = build_chat_body(&request, false);

        let response = self
            .client
            .post(self.deployment_url(&request.model, "chat/completions"))
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error("azure", e))?;

        let response = check_status("azure", response).await?;

        let resp: serde_json::Value =
            response.json().await.map_err(|e| SelfEvolveError::Provider {
                provider: "azure".into(),
                message: format!("Failed to parse response: {}", e),
                retriable: false,
            })?;

        Ok(parse_chat_response(&resp))
    }

    async fn embed(&self, model: &str, texts: &[&str]) -> Result<Vec<Vec<f32>>, SelfEvolveError> {
        let body = serde_json::json!({ "input": texts });

        let response = self
            .client
            .post(self.deployment_url(model, "embeddings"))
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error("azure", e))?;

        let response = check_status("azure", response).await?;

        let resp: serde_json::Value =
            response.json().await.map_err(|e| SelfEvolveError::Provider {
                provider: "azure".into(),
                message: format!("Failed to parse embedding response: {}", e),
                retriable: false,
            })?;

        Ok(parse_embeddings(&resp))
    }
}
