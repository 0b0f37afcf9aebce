// src/provider/bedrock.rs — AWS Bedrock provider (SigV4 auth)
//
// Uses the Bedrock Runtime "converse" API for chat and "invoke" with a Titan
// embedding model for embeddings. Requests are signed with SigV4 directly
// instead of going through the AWS SDK.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use super::openai::{check_status, send_error};
use super::{ChatRequest, ChatResponse, ModelProvider, Role, StopReason, TokenUsage};
use crate::infra::errors::SelfEvolveError;

type HmacSha256 = Hmac<Sha256>;

/// Credentials and region for the Bedrock Runtime endpoint.
#[derive(Debug, Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub region: String,
}

pub struct BedrockProvider {
    credentials: AwsCredentials,
    client: reqwest::Client,
}

impl BedrockProvider {
    pub fn new(credentials: AwsCredentials, client: reqwest::Client) -> Self {
        Self {
            credentials,
            client,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "https://bedrock-runtime.{}.amazonaws.com",
            self.credentials.region
        )
    }

    /// Model ids contain `:`, which must be percent-encoded in the path.
    fn model_url(&self, model_id: &str, operation: &str) -> String {
        format!(
            "{}/model/{}/{}",
            self.endpoint(),
            urlencoding::encode(model_id),
            operation
        )
    }

    /// Build the Bedrock Converse API request body from a ChatRequest.
    fn build_converse_body(&self, request: &ChatRequest) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                serde_json::json!({
                    "role": m.role.as_str(),
                    "content": [{ "text": m.content }],
                })
            })
            .collect();

        let mut body = serde_json::json!({ "messages": messages });

        let system_text = request.system.as_deref().or_else(|| {
            request
                .messages
                .iter()
                .find(|m| m.role == Role::System)
                .map(|m| m.content.as_str())
        });
        if let Some(sys) = system_text {
            body["system"] = serde_json::json!([{ "text": sys }]);
        }

        let mut inference = serde_json::Map::new();
        if let Some(max_tokens) = request.max_tokens {
            inference.insert("maxTokens".into(), serde_json::json!(max_tokens));
        }
        if let Some(temp) = request.temperature {
            inference.insert("temperature".into(), serde_json::json!(temp));
        }
        if let Some(top_p) = request.top_p {
            inference.insert("topP".into(), serde_json::json!(top_p));
        }
        if !inference.is_empty() {
            body["inferenceConfig"] = serde_json::Value::Object(inference);
        }

        body
    }

    /// Sign a request with AWS SigV4 and return the headers to send.
    fn sign_request(
        &self,
        method: &str,
        url: &str,
        payload: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Vec<(String, String)>, SelfEvolveError> {
        let datestamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

        let parsed = url::Url::parse(url)
            .map_err(|e| SelfEvolveError::Config(format!("invalid Bedrock URL {url}: {e}")))?;
        let host = parsed.host_str().unwrap_or_default().to_string();

        let mut headers: Vec<(String, String)> = vec![
            ("content-type".into(), "application/json".into()),
            ("host".into(), host),
            ("x-amz-date".into(), amz_date.clone()),
        ];
        if let Some(ref token) = self.credentials.session_token {
            headers.push(("x-amz-security-token".into(), token.clone()));
        }
        headers.sort_by(|a, b| a.0.cmp(&b.0));

        let signed_headers = headers
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(";");
        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v.trim()))
            .collect();

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method,
            canonical_uri(parsed.path()),
            parsed.query().unwrap_or(""),
            canonical_headers,
            signed_headers,
            sha256_hex(payload)
        );

        let credential_scope = format!(
            "{}/{}/bedrock/aws4_request",
            datestamp, self.credentials.region
        );
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            credential_scope,
            sha256_hex(canonical_request.as_bytes())
        );

        let k_date = hmac_sha256(
            format!("AWS4{}", self.credentials.secret_access_key).as_bytes(),
            datestamp.as_bytes(),
        )?;
        let k_region = hmac_sha256(&k_date, self.credentials.region.as_bytes())?;
        let k_service = hmac_sha256(&k_region, b"bedrock")?;
        let k_signing = hmac_sha256(&k_service, b"aws4_request")?;
        let signature = hex::encode(hmac_sha256(&k_signing, string_to_sign.as_bytes())?);

        headers.push((
            "authorization".into(),
            format!(
                "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
                self.credentials.access_key_id, credential_scope, signed_headers, signature
            ),
        ));

        Ok(headers)
    }

    async fn post_signed(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, SelfEvolveError> {
        let payload = serde_json::to_vec(body)?;
        let headers = self.sign_request("POST", url, &payload, Utc::now())?;

        let mut req = self.client.post(url);
        for (k, v) in &headers {
            // reqwest derives Host from the URL
            if k != "host" {
                req = req.header(k.as_str(), v.as_str());
            }
        }

        let response = req
            .body(payload)
            .send()
            .await
            .map_err(|e| send_error("bedrock", e))?;
        let response = check_status("bedrock", response).await?;

        response.json().await.map_err(|e| SelfEvolveError::Provider {
            provider: "bedrock".into(),
            message: format!("Failed to parse response: {}", e),
            retriable: false,
        })
    }
}

#[async_trait]
impl ModelProvider for BedrockProvider {
    fn id(&self) -> &str {
        "bedrock"
    }

    fn name(&self) -> &str {
        "AWS Bedrock"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, SelfEvolveError> {
        let url = self.model_url(&request.model, "converse");
        let body = self.build_converse_body(&request);
        let resp = self.post_signed(&url, &body).await?;

        // { output: { message: { content: [{ text }] } }, usage: { ... }, stopReason }
        let content = resp["output"]["message"]["content"]
            .as_array()
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|c| c["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let usage = TokenUsage {
            input_tokens: resp["usage"]["inputTokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: resp["usage"]["outputTokens"].as_u64().unwrap_or(0) as u32,
        };

        let stop_reason = match resp["stopReason"].as_str() {
            Some("end_turn") => StopReason::EndTurn,
            Some("max_tokens") => StopReason::MaxTokens,
            Some("stop_sequence") => StopReason::StopSequence,
            Some("content_filtered") | Some("guardrail_intervened") => StopReason::ContentFilter,
            _ => StopReason::Unknown,
        };

        Ok(ChatResponse {
            content,
            usage,
            stop_reason,
        })
    }

    async fn embed(&self, model: &str, texts: &[&str]) -> Result<Vec<Vec<f32>>, SelfEvolveError> {
        // Titan embedding models take one input per invocation.
        let url = self.model_url(model, "invoke");
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            let resp = self
                .post_signed(&url, &serde_json::json!({ "inputText": text }))
                .await?;
            let embedding = resp["embedding"]
                .as_array()
                .map(|v| v.iter().map(|x| x.as_f64().unwrap_or(0.0) as f32).collect())
                .unwrap_or_default();
            out.push(embedding);
        }
        Ok(out)
    }
}

// ─── SigV4 helpers ──────────────────────────────────────────────────────────

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, SelfEvolveError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| SelfEvolveError::Config(format!("invalid signing key: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// SigV4 canonical URI: every path segment is URI-encoded once more.
fn canonical_uri(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
