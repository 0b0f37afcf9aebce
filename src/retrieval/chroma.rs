// src/retrieval/chroma.rs — Nearest-neighbour lookup against a Chroma server
//
// The query text is embedded with the configured provider, then sent to the
// collection's REST query endpoint. The collection id is resolved once.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use url::Url;

use super::Retriever;
use crate::infra::errors::SelfEvolveError;
use crate::provider::ModelProvider;

pub struct ChromaRetriever {
    client: reqwest::Client,
    base_url: Url,
    collection: String,
    collection_id: OnceCell<String>,
    embedder: Arc<dyn ModelProvider>,
    embedding_model: String,
}

impl ChromaRetriever {
    pub fn new(
        base_url: &str,
        collection: &str,
        embedder: Arc<dyn ModelProvider>,
        embedding_model: &str,
    ) -> Result<Self, SelfEvolveError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| SelfEvolveError::Config(format!("invalid chroma_url {base_url:?}: {e}")))?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            collection: collection.to_string(),
            collection_id: OnceCell::new(),
            embedder,
            embedding_model: embedding_model.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, SelfEvolveError> {
        self.base_url
            .join(path)
            .map_err(|e| SelfEvolveError::Retrieval(format!("bad chroma path {path:?}: {e}")))
    }

    async fn get_json(&self, url: Url) -> Result<serde_json::Value, SelfEvolveError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SelfEvolveError::Retrieval(e.to_string()))?;
        read_json(resp).await
    }

    async fn collection_id(&self) -> Result<&str, SelfEvolveError> {
        let id = self
            .collection_id
            .get_or_try_init(|| async {
                let url = self.endpoint(&collection_path(&self.collection))?;
                let body = self.get_json(url).await?;
                body["id"].as_str().map(str::to_string).ok_or_else(|| {
                    SelfEvolveError::Retrieval(format!(
                        "collection {:?} has no id in response",
                        self.collection
                    ))
                })
            })
            .await?;
        Ok(id.as_str())
    }
}

#[async_trait]
impl Retriever for ChromaRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>, SelfEvolveError> {
        let embedding = self
            .embedder
            .embed(&self.embedding_model, &[query])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SelfEvolveError::Retrieval("embedding response was empty".into()))?;

        let id = self.collection_id().await?;
        let url = self.endpoint(&format!("{}/query", collection_path(id)))?;
        let body = serde_json::json!({
            "query_embeddings": [embedding],
            "n_results": k,
            "include": ["documents"],
        });

        let resp = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SelfEvolveError::Retrieval(e.to_string()))?;
        let json = read_json(resp).await?;
        Ok(parse_documents(&json))
    }
}

fn collection_path(name_or_id: &str) -> String {
    format!("api/v1/collections/{}", urlencoding::encode(name_or_id))
}

async fn read_json(resp: reqwest::Response) -> Result<serde_json::Value, SelfEvolveError> {
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(SelfEvolveError::Retrieval(format!("chroma returned {status}: {text}")));
    }
    resp.json()
        .await
        .map_err(|e| SelfEvolveError::Retrieval(format!("bad chroma response: {e}")))
}

/// Documents for the first (only) query, skipping nulls.
fn parse_documents(json: &serde_json::Value) -> Vec<String> {
    json["documents"][0]
        .as_array()
        .map(|docs| {
            docs.iter()
                .filter_map(|d| d.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
