// src/retrieval/local.rs — Word-overlap ranking over a JSONL corpus on disk
//
// Each line is an object with a `text` field and an optional `title`.
// Passages are ranked by Jaccard similarity of their lowercase word sets.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use super::Retriever;
use crate::infra::errors::SelfEvolveError;

#[derive(Debug, Deserialize)]
struct CorpusLine {
    #[serde(default)]
    title: Option<String>,
    text: String,
}

struct Passage {
    text: String,
    words: HashSet<String>,
}

pub struct LocalCorpus {
    passages: Vec<Passage>,
}

impl LocalCorpus {
    pub fn load(path: &Path) -> Result<Self, SelfEvolveError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SelfEvolveError::Config(format!("cannot read corpus {}: {e}", path.display()))
        })?;
        let corpus = Self::parse(&raw)?;
        tracing::info!(path = %path.display(), passages = corpus.len(), "Loaded retrieval corpus");
        Ok(corpus)
    }

    pub fn parse(raw: &str) -> Result<Self, SelfEvolveError> {
        let mut passages = Vec::new();
        for (lineno, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: CorpusLine = serde_json::from_str(line).map_err(|e| {
                SelfEvolveError::Config(format!("corpus line {}: {e}", lineno + 1))
            })?;
            let text = match entry.title {
                Some(title) if !title.is_empty() => format!("{title}\n\n{}", entry.text),
                _ => entry.text,
            };
            passages.push(Passage {
                words: word_set(&text),
                text,
            });
        }
        Ok(Self { passages })
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    fn rank(&self, query: &str, k: usize) -> Vec<String> {
        let query_words = word_set(query);
        let mut scored: Vec<(f32, usize)> = self
            .passages
            .iter()
            .enumerate()
            .map(|(i, p)| (jaccard(&query_words, &p.words), i))
            .filter(|(score, _)| *score > 0.0)
            .collect();
        // Stable on ties: earlier corpus lines win.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        scored
            .into_iter()
            .take(k)
            .map(|(_, i)| self.passages[i].text.clone())
            .collect()
    }
}

#[async_trait]
impl Retriever for LocalCorpus {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>, SelfEvolveError> {
        Ok(self.rank(query, k))
    }
}

fn word_set(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}
