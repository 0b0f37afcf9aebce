// src/core/aggregate.rs — Per-category accuracy from the result records on disk
//
// Purely derived: scanning the same tree twice gives the same result.json.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::types::{Outcome, ProblemId};
use crate::infra::errors::SelfEvolveError;
use crate::infra::paths::{ExperimentLayout, RESULT_RECORD_FILE};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryAccuracy {
    pub category: String,
    pub correct: u32,
    pub total: u32,
}

impl CategoryAccuracy {
    /// `100 * correct / total`, or 0 for an empty category.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            100.0 * self.correct as f64 / self.total as f64
        }
    }
}

pub struct ExperimentAggregator {
    root: PathBuf,
    result_file: PathBuf,
    expected: Vec<String>,
}

impl ExperimentAggregator {
    pub fn new(layout: &ExperimentLayout) -> Self {
        Self {
            root: layout.root().to_path_buf(),
            result_file: layout.result_file(),
            expected: Vec::new(),
        }
    }

    /// Categories reported even when no record exists for them yet.
    pub fn with_categories(mut self, categories: &[String]) -> Self {
        self.expected = categories.to_vec();
        self
    }

    /// Count records per category.
    pub fn tally(&self) -> Result<Vec<CategoryAccuracy>, SelfEvolveError> {
        let mut by_category: BTreeMap<String, CategoryAccuracy> = self
            .expected
            .iter()
            .map(|c| {
                (
                    c.clone(),
                    CategoryAccuracy {
                        category: c.clone(),
                        ..Default::default()
                    },
                )
            })
            .collect();

        for path in self.records()? {
            let Some(id) = problem_dir_name(&path).and_then(ProblemId::parse) else {
                tracing::warn!(path = %path.display(), "Skipping record outside a problem directory");
                continue;
            };
            let text = std::fs::read_to_string(&path)
                .map_err(|e| SelfEvolveError::persistence(&path, e))?;
            let correct = match Outcome::parse_record(&text) {
                Some(outcome) => outcome == Outcome::Correct,
                None => {
                    tracing::warn!(path = %path.display(), "Unrecognised record, counting as incorrect");
                    false
                }
            };

            let entry = by_category
                .entry(id.category.clone())
                .or_insert_with(|| CategoryAccuracy {
                    category: id.category.clone(),
                    ..Default::default()
                });
            entry.total += 1;
            if correct {
                entry.correct += 1;
            }
        }

        Ok(by_category.into_values().collect())
    }

    /// Tally, write `result.json`, and return category → percent.
    pub fn aggregate(&self) -> Result<BTreeMap<String, f64>, SelfEvolveError> {
        let percents: BTreeMap<String, f64> = self
            .tally()?
            .into_iter()
            .map(|acc| {
                let percent = acc.percent();
                (acc.category, percent)
            })
            .collect();

        std::fs::create_dir_all(&self.root).map_err(|e| SelfEvolveError::persistence(&self.root, e))?;
        let body = serde_json::to_string_pretty(&percents)?;
        std::fs::write(&self.result_file, body)
            .map_err(|e| SelfEvolveError::persistence(&self.result_file, e))?;

        tracing::info!(
            path = %self.result_file.display(),
            categories = percents.len(),
            "Wrote experiment summary"
        );
        Ok(percents)
    }

    fn records(&self) -> Result<Vec<PathBuf>, SelfEvolveError> {
        let pattern = format!(
            "{}/*/{}",
            glob::Pattern::escape(&self.root.to_string_lossy()),
            RESULT_RECORD_FILE
        );
        let paths = glob::glob(&pattern)
            .map_err(|e| SelfEvolveError::Config(format!("bad glob pattern {pattern:?}: {e}")))?;

        let mut records = Vec::new();
        for entry in paths {
            match entry {
                Ok(path) => records.push(path),
                Err(e) => tracing::warn!("Unreadable entry while scanning results: {}", e),
            }
        }
        records.sort();
        Ok(records)
    }
}

fn problem_dir_name(record: &Path) -> Option<&str> {
    record.parent()?.file_name()?.to_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(root: &Path, dir: &str, text: &str) {
        let d = root.join(dir);
        std::fs::create_dir_all(&d).unwrap();
        std::fs::write(d.join(RESULT_RECORD_FILE), text).unwrap();
    }

    fn layout(tmp: &tempfile::TempDir) -> ExperimentLayout {
        ExperimentLayout::new(tmp.path(), "exp")
    }

    #[test]
    fn test_three_of_four() {
        let tmp = tempfile::tempdir().unwrap();
        let l = layout(&tmp);
        write(l.root(), "Numpy_000", "Correct");
        write(l.root(), "Numpy_001", "Correct");
        write(l.root(), "Numpy_002", "Incorrect");
        write(l.root(), "Numpy_003", "Correct");

        let result = ExperimentAggregator::new(&l).aggregate().unwrap();
        assert_eq!(result.get("Numpy"), Some(&75.0));

        let on_disk: BTreeMap<String, f64> =
            serde_json::from_str(&std::fs::read_to_string(l.result_file()).unwrap()).unwrap();
        assert_eq!(on_disk, result);
    }

    #[test]
    fn test_empty_category_is_zero() {
        let tmp = tempfile::tempdir().unwrap();
        let l = layout(&tmp);
        let result = ExperimentAggregator::new(&l)
            .with_categories(&["Scipy".to_string()])
            .aggregate()
            .unwrap();
        assert_eq!(result.get("Scipy"), Some(&0.0));
    }

    #[test]
    fn test_groups_by_category_and_skips_strays() {
        let tmp = tempfile::tempdir().unwrap();
        let l = layout(&tmp);
        write(l.root(), "Pandas_000", "Correct\n");
        write(l.root(), "Pandas_001", "Incorrect");
        write(l.root(), "Sklearn_010", "Correct");
        write(l.root(), "scratch", "Correct");
        write(l.root(), "Matplotlib_004", "maybe");

        let tally = ExperimentAggregator::new(&l).tally().unwrap();
        assert_eq!(
            tally,
            vec![
                CategoryAccuracy { category: "Matplotlib".into(), correct: 0, total: 1 },
                CategoryAccuracy { category: "Pandas".into(), correct: 1, total: 2 },
                CategoryAccuracy { category: "Sklearn".into(), correct: 1, total: 1 },
            ]
        );
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let l = layout(&tmp);
        write(l.root(), "Tensorflow_000", "Incorrect");
        let agg = ExperimentAggregator::new(&l);
        let first = agg.aggregate().unwrap();
        let first_json = std::fs::read_to_string(l.result_file()).unwrap();
        let second = agg.aggregate().unwrap();
        assert_eq!(first, second);
        assert_eq!(first_json, std::fs::read_to_string(l.result_file()).unwrap());
    }

    #[test]
    fn test_percent() {
        let acc = CategoryAccuracy { category: "Scipy".into(), correct: 1, total: 3 };
        assert!((acc.percent() - 33.333333).abs() < 1e-4);
        assert_eq!(CategoryAccuracy::default().percent(), 0.0);
    }
}
