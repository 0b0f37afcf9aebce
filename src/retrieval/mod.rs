// src/retrieval/mod.rs — Reference passages for hint generation
//
// Only the initial hint request asks for a passage. A failed lookup is not
// fatal: the caller logs it and continues with an empty passage.

pub mod chroma;
pub mod local;

use std::sync::Arc;

use async_trait::async_trait;

use crate::infra::config::{RetrievalBackend, RetrievalConfig};
use crate::infra::errors::SelfEvolveError;
use crate::provider::ModelProvider;

/// Returns the `k` passages most similar to a query, best first.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>, SelfEvolveError>;
}

/// Retriever that never finds anything.
pub struct NoRetrieval;

#[async_trait]
impl Retriever for NoRetrieval {
    async fn retrieve(&self, _query: &str, _k: usize) -> Result<Vec<String>, SelfEvolveError> {
        Ok(Vec::new())
    }
}

/// Build the configured retriever. `embedder` is only consulted for Chroma.
pub fn build_retriever(
    config: &RetrievalConfig,
    embedder: Option<Arc<dyn ModelProvider>>,
) -> Result<Arc<dyn Retriever>, SelfEvolveError> {
    match config.backend {
        RetrievalBackend::None => Ok(Arc::new(NoRetrieval)),
        RetrievalBackend::Local => {
            let path = config.corpus_path.as_ref().ok_or_else(|| {
                SelfEvolveError::Config("retrieval.backend = \"local\" requires corpus_path".into())
            })?;
            Ok(Arc::new(local::LocalCorpus::load(path)?))
        }
        RetrievalBackend::Chroma => {
            let embedder = embedder.ok_or_else(|| {
                SelfEvolveError::Config("chroma retrieval requires an embedding provider".into())
            })?;
            Ok(Arc::new(chroma::ChromaRetriever::new(
                &config.chroma_url,
                &config.collection,
                embedder,
                &config.embedding_model,
            )?))
        }
    }
}
