// tests/runner_test.rs — Integration test: resumable problem runs and aggregation

mod common;

use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;

use selfevolve::cli::run::{run_problems, RunSummary};
use selfevolve::core::aggregate::ExperimentAggregator;
use selfevolve::core::runner::ProblemRunner;
use selfevolve::core::types::{ExperimentConfig, Outcome, Strategy, Termination, Verdict};
use selfevolve::dataset::Dataset;
use selfevolve::infra::errors::SelfEvolveError;
use selfevolve::infra::paths::ExperimentLayout;
use selfevolve::provider::LlmModel;

use common::*;

fn runner(
    tmp: &tempfile::TempDir,
    provider: std::sync::Arc<MockProvider>,
    evaluator: std::sync::Arc<ScriptedEvaluator>,
) -> ProblemRunner {
    ProblemRunner::new(
        correction_loop(provider, evaluator, settings(true, 3)),
        ExperimentLayout::new(tmp.path(), "exp"),
    )
    .with_cooldown(Duration::ZERO)
}

// ─── Records ────────────────────────────────────────────────────

#[tokio::test]
async fn test_fresh_run_writes_record() {
    let tmp = tempfile::tempdir().unwrap();
    let p = problem("Numpy", 0);
    let r = runner(&tmp, MockProvider::new(), ScriptedEvaluator::new(vec![Verdict::Pass]));

    let report = r.run(&p).await.unwrap();
    assert!(!report.resumed);
    assert_eq!(report.outcome, Outcome::Correct);
    assert_eq!(report.termination, Some(Termination::Passed));

    let record = tmp.path().join("exp/Numpy_000/result.txt");
    assert_eq!(std::fs::read_to_string(record).unwrap(), "Correct");
}

#[tokio::test]
async fn test_failed_problem_is_incorrect() {
    let tmp = tempfile::tempdir().unwrap();
    let p = problem("Pandas", 1);
    let evaluator = ScriptedEvaluator::new(vec![
        fail("r = 0", "Traceback: a"),
        fail("r = 1", "Traceback: b"),
        fail("r = 2", "Traceback: c"),
    ]);
    let report = runner(&tmp, MockProvider::new(), evaluator).run(&p).await.unwrap();

    assert_eq!(report.outcome, Outcome::Incorrect);
    assert_eq!(report.attempts.len(), 3);
    let record = tmp.path().join("exp/Pandas_001/result.txt");
    assert_eq!(std::fs::read_to_string(record).unwrap(), "Incorrect");
}

#[tokio::test]
async fn test_resume_makes_no_calls() {
    let tmp = tempfile::tempdir().unwrap();
    let p = problem("Scipy", 2);
    runner(&tmp, MockProvider::new(), ScriptedEvaluator::new(vec![Verdict::Pass]))
        .run(&p)
        .await
        .unwrap();

    let provider = MockProvider::new();
    let evaluator = ScriptedEvaluator::new(vec![]);
    let report = runner(&tmp, provider.clone(), evaluator.clone())
        .run(&p)
        .await
        .unwrap();

    assert!(report.resumed);
    assert_eq!(report.outcome, Outcome::Correct);
    assert!(report.attempts.is_empty());
    assert_eq!(provider.calls(), 0);
    assert_eq!(evaluator.calls(), 0);
}

#[tokio::test]
async fn test_existing_record_is_never_overwritten() {
    let tmp = tempfile::tempdir().unwrap();
    let p = problem("Sklearn", 3);
    let dir = tmp.path().join("exp/Sklearn_003");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("result.txt"), "Incorrect\n").unwrap();

    // the harness would pass it now, but the record stands
    let report = runner(&tmp, MockProvider::new(), ScriptedEvaluator::new(vec![Verdict::Pass]))
        .run(&p)
        .await
        .unwrap();

    assert!(report.resumed);
    assert_eq!(report.outcome, Outcome::Incorrect);
    assert_eq!(std::fs::read_to_string(dir.join("result.txt")).unwrap(), "Incorrect\n");
}

#[tokio::test]
async fn test_corrupt_record_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let p = problem("Pytorch", 4);
    let dir = tmp.path().join("exp/Pytorch_004");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("result.txt"), "Maybe").unwrap();

    let provider = MockProvider::new();
    let err = runner(&tmp, provider.clone(), ScriptedEvaluator::new(vec![]))
        .run(&p)
        .await
        .unwrap_err();
    assert!(matches!(err, SelfEvolveError::CorruptRecord { ref content, .. } if content == "Maybe"));
    assert_eq!(provider.calls(), 0);
}

// ─── Cooldown ───────────────────────────────────────────────────

#[tokio::test]
async fn test_resume_skips_cooldown_by_default() {
    let tmp = tempfile::tempdir().unwrap();
    let p = problem("Numpy", 5);
    runner(&tmp, MockProvider::new(), ScriptedEvaluator::new(vec![Verdict::Pass]))
        .run(&p)
        .await
        .unwrap();

    let slow = runner(&tmp, MockProvider::new(), ScriptedEvaluator::new(vec![]))
        .with_cooldown(Duration::from_secs(5));
    let started = Instant::now();
    assert!(slow.run(&p).await.unwrap().resumed);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_cooldown_on_resume_when_enabled() {
    let tmp = tempfile::tempdir().unwrap();
    let p = problem("Numpy", 6);
    runner(&tmp, MockProvider::new(), ScriptedEvaluator::new(vec![Verdict::Pass]))
        .run(&p)
        .await
        .unwrap();

    let paced = runner(&tmp, MockProvider::new(), ScriptedEvaluator::new(vec![]))
        .with_cooldown(Duration::from_millis(150))
        .with_cooldown_on_resume(true);
    let started = Instant::now();
    paced.run(&p).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(150));
}

// ─── Whole experiment ───────────────────────────────────────────

const DATASET: &str = r#"{"category": "Numpy", "index": 0, "prompt": "n0", "code_context": "[insert]"}
{"category": "Numpy", "index": 1, "prompt": "n1", "code_context": "[insert]"}
{"category": "Numpy", "index": 2, "prompt": "n2", "code_context": "[insert]"}
{"category": "Numpy", "index": 3, "prompt": "n3", "code_context": "[insert]"}
{"category": "Pandas", "index": 0, "prompt": "p0", "code_context": "[insert]"}
"#;

fn experiment(categories: &[&str]) -> ExperimentConfig {
    ExperimentConfig {
        experiment_name: "exp".into(),
        categories: categories.iter().map(|c| c.to_string()).collect(),
        sampling_fraction: 1.0,
        initial_strategy: Strategy::ZeroShot,
        correction_strategy: Strategy::ZeroShot,
        initial_model: LlmModel::OpenAIGpt4o,
        correction_model: LlmModel::OpenAIGpt4o,
        temperature: 0.9,
        top_p: 0.9,
        self_correction: false,
        max_attempts: 1,
    }
}

#[tokio::test]
async fn test_run_then_resume_then_aggregate() {
    let tmp = tempfile::tempdir().unwrap();
    let dataset = Dataset::parse(DATASET).unwrap();
    let exp = experiment(&["Numpy", "Pandas", "Scipy"]);
    let layout = ExperimentLayout::new(tmp.path(), "exp");

    // Numpy: pass, pass, fail, pass; Pandas: fail
    let evaluator = ScriptedEvaluator::new(vec![
        Verdict::Pass,
        Verdict::Pass,
        fail("x", "Traceback"),
        Verdict::Pass,
        Verdict::OpaqueFail,
    ]);
    let first = ProblemRunner::new(
        correction_loop(MockProvider::new(), evaluator, settings(false, 1)),
        layout.clone(),
    )
    .with_cooldown(Duration::ZERO);
    let summary = run_problems(&first, &dataset, &exp, None).await.unwrap();
    assert_eq!(
        summary,
        RunSummary {
            evaluated: 5,
            resumed: 0,
            correct: 3,
        }
    );

    // a second run only resumes
    let provider = MockProvider::new();
    let second = ProblemRunner::new(
        correction_loop(provider.clone(), ScriptedEvaluator::new(vec![]), settings(false, 1)),
        layout.clone(),
    )
    .with_cooldown(Duration::ZERO);
    let summary = run_problems(&second, &dataset, &exp, None).await.unwrap();
    assert_eq!(summary.resumed, 5);
    assert_eq!(provider.calls(), 0);

    let percents = ExperimentAggregator::new(&layout)
        .with_categories(&exp.categories)
        .aggregate()
        .unwrap();
    assert_eq!(percents.get("Numpy"), Some(&75.0));
    assert_eq!(percents.get("Pandas"), Some(&0.0));
    assert_eq!(percents.get("Scipy"), Some(&0.0));
    assert!(layout.result_file().exists());
}

#[tokio::test]
async fn test_sampled_run_is_reproducible() {
    let dataset = Dataset::parse(DATASET).unwrap();
    let mut exp = experiment(&["Numpy"]);
    exp.sampling_fraction = 0.5;

    let mut picked = Vec::new();
    for _ in 0..2 {
        let tmp = tempfile::tempdir().unwrap();
        let layout = ExperimentLayout::new(tmp.path(), "exp");
        let runner = ProblemRunner::new(
            correction_loop(
                MockProvider::new(),
                ScriptedEvaluator::new(vec![Verdict::Pass, Verdict::Pass]),
                settings(false, 1),
            ),
            layout.clone(),
        )
        .with_cooldown(Duration::ZERO);
        let summary = run_problems(&runner, &dataset, &exp, Some(17)).await.unwrap();
        assert_eq!(summary.evaluated, 2);

        let mut dirs: Vec<String> = std::fs::read_dir(layout.root())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        dirs.sort();
        picked.push(dirs);
    }
    assert_eq!(picked[0], picked[1]);
}
