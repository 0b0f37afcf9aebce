// src/provider/resolver.rs — Build providers from environment credentials
//
// Every provider is wrapped in RetryProvider. A missing credential is a
// configuration error raised before the first problem runs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::azure::AzureOpenAIProvider;
use super::bedrock::{AwsCredentials, BedrockProvider};
use super::google::GoogleProvider;
use super::openai::OpenAIProvider;
use super::retry::{RetryPolicy, RetryProvider};
use super::{ModelProvider, ProviderKind};
use crate::infra::config::ProvidersConfig;
use crate::infra::errors::SelfEvolveError;

/// Lookup for credential variables; the process environment in production.
pub trait EnvSource {
    fn var(&self, name: &str) -> Option<String>;
}

pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.trim().is_empty())
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

fn require(env: &dyn EnvSource, kind: ProviderKind, name: &str) -> Result<String, SelfEvolveError> {
    env.var(name).ok_or_else(|| {
        SelfEvolveError::Config(format!(
            "{} requires {} to be set (needs: {})",
            kind,
            name,
            kind.required_env().join(", ")
        ))
    })
}

/// Build one provider (retry-wrapped) for the given backend.
pub fn build_provider(
    kind: ProviderKind,
    settings: &ProvidersConfig,
    env: &dyn EnvSource,
) -> Result<Arc<dyn ModelProvider>, SelfEvolveError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .build()
        .map_err(|e| SelfEvolveError::Config(format!("cannot build HTTP client: {e}")))?;

    let inner: Arc<dyn ModelProvider> = match kind {
        ProviderKind::OpenAI => {
            let key = require(env, kind, "OPENAI_API_KEY")?;
            let base = settings
                .openai_base_url
                .clone()
                .or_else(|| env.var("OPENAI_BASE_URL"));
            match base {
                Some(base) => Arc::new(OpenAIProvider::with_base_url(key, base, client)),
                None => Arc::new(OpenAIProvider::new(key, client)),
            }
        }
        ProviderKind::Azure => {
            let key = require(env, kind, "AZURE_API_KEY")?;
            let base = require(env, kind, "AZURE_API_BASE")?;
            let version = settings
                .azure_api_version
                .clone()
                .or_else(|| env.var("AZURE_API_VERSION"));
            Arc::new(AzureOpenAIProvider::new(key, base, version, client))
        }
        ProviderKind::Bedrock => {
            let credentials = AwsCredentials {
                access_key_id: require(env, kind, "AWS_ACCESS_KEY_ID")?,
                secret_access_key: require(env, kind, "AWS_SECRET_ACCESS_KEY")?,
                session_token: env.var("AWS_SESSION_TOKEN"),
                region: settings
                    .aws_region
                    .clone()
                    .or_else(|| env.var("AWS_REGION"))
                    .or_else(|| env.var("AWS_DEFAULT_REGION"))
                    .unwrap_or_else(|| "us-east-1".into()),
            };
            Arc::new(BedrockProvider::new(credentials, client))
        }
        ProviderKind::Google => {
            let key = env
                .var("GEMINI_API_KEY")
                .or_else(|| env.var("GOOGLE_API_KEY"))
                .ok_or_else(|| {
                    SelfEvolveError::Config(
                        "google requires GEMINI_API_KEY (or GOOGLE_API_KEY) to be set".into(),
                    )
                })?;
            Arc::new(GoogleProvider::new(key, client))
        }
    };

    tracing::debug!(provider = kind.as_str(), "Provider ready");
    Ok(Arc::new(RetryProvider::new(
        inner,
        RetryPolicy::with_max_retries(settings.max_retries),
    )))
}

/// Builds each backend at most once per run.
pub struct ProviderRegistry<'a> {
    settings: ProvidersConfig,
    env: &'a dyn EnvSource,
    cache: HashMap<ProviderKind, Arc<dyn ModelProvider>>,
}

impl<'a> ProviderRegistry<'a> {
    pub fn new(settings: ProvidersConfig, env: &'a dyn EnvSource) -> Self {
        Self {
            settings,
            env,
            cache: HashMap::new(),
        }
    }

    pub fn get(&mut self, kind: ProviderKind) -> Result<Arc<dyn ModelProvider>, SelfEvolveError> {
        if let Some(p) = self.cache.get(&kind) {
            return Ok(p.clone());
        }
        let provider = build_provider(kind, &self.settings, self.env)?;
        self.cache.insert(kind, provider.clone());
        Ok(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let e = env(&[]);
        let err = build_provider(ProviderKind::OpenAI, &ProvidersConfig::default(), &e)
            .err()
            .unwrap();
        assert!(matches!(err, SelfEvolveError::Config(ref m) if m.contains("OPENAI_API_KEY")));
    }

    #[test]
    fn test_azure_needs_base() {
        let e = env(&[("AZURE_API_KEY", "k")]);
        let err = build_provider(ProviderKind::Azure, &ProvidersConfig::default(), &e)
            .err()
            .unwrap();
        assert!(err.to_string().contains("AZURE_API_BASE"));
    }

    #[test]
    fn test_builds_each_backend() {
        let e = env(&[
            ("OPENAI_API_KEY", "sk"),
            ("AZURE_API_KEY", "k"),
            ("AZURE_API_BASE", "https://x.openai.azure.com"),
            ("AWS_ACCESS_KEY_ID", "id"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("GOOGLE_API_KEY", "g"),
        ]);
        let settings = ProvidersConfig::default();
        for (kind, id) in [
            (ProviderKind::OpenAI, "openai"),
            (ProviderKind::Azure, "azure"),
            (ProviderKind::Bedrock, "bedrock"),
            (ProviderKind::Google, "google"),
        ] {
            let p = build_provider(kind, &settings, &e).unwrap();
            assert_eq!(p.id(), id);
        }
    }

    #[test]
    fn test_registry_caches() {
        let e = env(&[("OPENAI_API_KEY", "sk")]);
        let mut registry = ProviderRegistry::new(ProvidersConfig::default(), &e);
        let a = registry.get(ProviderKind::OpenAI).unwrap();
        let b = registry.get(ProviderKind::OpenAI).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(registry.get(ProviderKind::Bedrock).is_err());
    }
}
