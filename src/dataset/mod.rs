// src/dataset/mod.rs — Benchmark problems from a JSONL file, with per-category sampling

use std::collections::HashSet;
use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Deserialize;

use crate::core::types::{Problem, ProblemId};
use crate::infra::errors::SelfEvolveError;

#[derive(Debug, Deserialize)]
struct DatasetLine {
    category: String,
    index: u32,
    prompt: String,
    code_context: String,
}

#[derive(Debug, Default)]
pub struct Dataset {
    problems: Vec<Problem>,
}

impl Dataset {
    pub fn load(path: &Path) -> Result<Self, SelfEvolveError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SelfEvolveError::Config(format!("cannot read dataset {}: {e}", path.display()))
        })?;
        let dataset = Self::parse(&raw)?;
        tracing::info!(path = %path.display(), problems = dataset.len(), "Loaded dataset");
        Ok(dataset)
    }

    /// Parse one problem per line. Duplicate ids are rejected.
    pub fn parse(raw: &str) -> Result<Self, SelfEvolveError> {
        let mut seen = HashSet::new();
        let mut problems = Vec::new();
        for (lineno, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: DatasetLine = serde_json::from_str(line).map_err(|e| {
                SelfEvolveError::Config(format!("dataset line {}: {e}", lineno + 1))
            })?;
            let id = ProblemId::new(entry.category, entry.index);
            if !seen.insert(id.clone()) {
                return Err(SelfEvolveError::Config(format!(
                    "dataset line {}: duplicate problem {}",
                    lineno + 1,
                    id
                )));
            }
            problems.push(Problem {
                id,
                prompt: entry.prompt,
                code_context: entry.code_context,
            });
        }
        Ok(Self { problems })
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    /// Problems of one category in index order.
    pub fn category(&self, name: &str) -> Vec<&Problem> {
        let mut problems: Vec<&Problem> = self
            .problems
            .iter()
            .filter(|p| p.id.category == name)
            .collect();
        problems.sort_by_key(|p| p.id.index);
        problems
    }
}

/// Random source for sampling; reproducible when a seed is given.
pub fn sampler(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Pick `max(1, floor(n * fraction))` problems without replacement, returned
/// in index order. A fraction of 1 or more keeps everything.
pub fn sample<'a>(problems: &[&'a Problem], fraction: f64, rng: &mut StdRng) -> Vec<&'a Problem> {
    if fraction >= 1.0 || problems.is_empty() {
        return problems.to_vec();
    }
    let k = ((problems.len() as f64 * fraction).floor() as usize).max(1);
    let mut picked: Vec<&Problem> = problems.choose_multiple(rng, k).copied().collect();
    picked.sort_by_key(|p| p.id.index);
    picked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jsonl(n: u32) -> String {
        (0..n)
            .rev()
            .map(|i| {
                format!(
                    r#"{{"category": "Numpy", "index": {i}, "prompt": "p{i}", "code_context": "[insert]"}}"#
                )
            })
            .chain(std::iter::once(
                r#"{"category": "Pandas", "index": 0, "prompt": "q", "code_context": "[insert]"}"#.to_string(),
            ))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_parse_and_group() {
        let ds = Dataset::parse(&jsonl(4)).unwrap();
        assert_eq!(ds.len(), 5);
        let numpy = ds.category("Numpy");
        let indices: Vec<u32> = numpy.iter().map(|p| p.id.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert_eq!(ds.category("Pandas").len(), 1);
        assert!(ds.category("Scipy").is_empty());
    }

    #[test]
    fn test_duplicate_is_rejected() {
        let raw = format!("{}\n{}", jsonl(1), jsonl(1));
        let err = Dataset::parse(&raw).unwrap_err();
        assert!(err.to_string().contains("duplicate problem Numpy_000"));
    }

    #[test]
    fn test_bad_line_reports_number() {
        let err = Dataset::parse("\n{\"category\": \"Numpy\"}").unwrap_err();
        assert!(err.to_string().contains("dataset line 2"));
    }

    #[test]
    fn test_full_fraction_keeps_order() {
        let ds = Dataset::parse(&jsonl(6)).unwrap();
        let all = ds.category("Numpy");
        let picked = sample(&all, 1.0, &mut sampler(Some(1)));
        assert_eq!(picked, all);
    }

    #[test]
    fn test_fraction_size_and_order() {
        let ds = Dataset::parse(&jsonl(10)).unwrap();
        let all = ds.category("Numpy");
        let picked = sample(&all, 0.35, &mut sampler(Some(42)));
        assert_eq!(picked.len(), 3);
        assert!(picked.windows(2).all(|w| w[0].id.index < w[1].id.index));
    }

    #[test]
    fn test_tiny_fraction_takes_one() {
        let ds = Dataset::parse(&jsonl(3)).unwrap();
        let all = ds.category("Numpy");
        assert_eq!(sample(&all, 0.01, &mut sampler(None)).len(), 1);
    }

    #[test]
    fn test_seed_is_reproducible() {
        let ds = Dataset::parse(&jsonl(20)).unwrap();
        let all = ds.category("Numpy");
        let a = sample(&all, 0.5, &mut sampler(Some(9)));
        let b = sample(&all, 0.5, &mut sampler(Some(9)));
        assert_eq!(a, b);
    }
}
