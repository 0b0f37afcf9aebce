// src/cli/run.rs — `selfevolve run`: drive an experiment across categories
//
// Builds the providers, retriever and harness once, then runs every sampled
// problem in order. Problems with a result record are skipped, so an
// interrupted run picks up where it stopped.

use std::sync::Arc;
use std::time::Duration;

use crate::cli::progress::terminal_progress;
use crate::cli::report::render_table;
use crate::cli::RunArgs;
use crate::core::aggregate::ExperimentAggregator;
use crate::core::correction::{CorrectionLoop, LoopSettings};
use crate::core::generator::{GenerationClient, SamplingParams};
use crate::core::prompts::PromptBuilder;
use crate::core::runner::ProblemRunner;
use crate::core::types::{ExperimentConfig, Outcome, ProgressFn, Strategy};
use crate::dataset::{self, Dataset};
use crate::evaluator::HarnessEvaluator;
use crate::infra::config::{Config, RetrievalBackend};
use crate::infra::errors::SelfEvolveError;
use crate::infra::paths::ExperimentLayout;
use crate::provider::resolver::{EnvSource, ProviderRegistry};
use crate::provider::LlmModel;
use crate::retrieval::{self, NoRetrieval, Retriever};

/// Counts for the end-of-run log line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub evaluated: u32,
    pub resumed: u32,
    pub correct: u32,
}

/// Fold command-line flags into the loaded config.
pub fn apply_overrides(config: &mut Config, args: &RunArgs) {
    let exp = &mut config.experiment;
    if let Some(ref name) = args.experiment {
        exp.name = name.clone();
    }
    if let Some(ref categories) = args.categories {
        exp.categories = categories.clone();
    }
    if let Some(f) = args.sampling_fraction {
        exp.sampling_fraction = f;
    }
    if args.seed.is_some() {
        exp.seed = args.seed;
    }
    if let Some(secs) = args.cooldown_secs {
        exp.cooldown_secs = secs;
    }
    if let Some(ref dir) = args.artifacts_dir {
        exp.artifacts_dir = dir.clone();
    }

    let gen = &mut config.generation;
    if let Some(s) = args.initial_strategy {
        gen.initial_strategy = s;
    }
    if let Some(s) = args.correction_strategy {
        gen.correction_strategy = s;
    }
    if let Some(m) = args.initial_model {
        gen.initial_model = m;
    }
    if let Some(m) = args.correction_model {
        gen.correction_model = m;
    }
    if let Some(t) = args.temperature {
        gen.temperature = t;
    }
    if let Some(p) = args.top_p {
        gen.top_p = p;
    }

    if args.self_correction {
        config.correction.enabled = true;
    }
    if args.no_self_correction {
        config.correction.enabled = false;
    }
    if let Some(n) = args.max_attempts {
        config.correction.max_attempts = n;
    }
    if let Some(ref path) = args.dataset {
        config.dataset.path = path.clone();
    }
}

/// The validated, immutable parameters of this run.
pub fn experiment_config(config: &Config) -> Result<ExperimentConfig, SelfEvolveError> {
    let exp = ExperimentConfig {
        experiment_name: config.experiment.name.clone(),
        categories: config.experiment.categories.clone(),
        sampling_fraction: config.experiment.sampling_fraction,
        initial_strategy: config.generation.initial_strategy,
        correction_strategy: config.generation.correction_strategy,
        initial_model: config.generation.initial_model,
        correction_model: config.generation.correction_model,
        temperature: config.generation.temperature,
        top_p: config.generation.top_p,
        self_correction: config.correction.enabled,
        max_attempts: config.correction.max_attempts,
    };
    exp.validate()?;
    Ok(exp)
}

/// Write `config.json`, warning if a previous run used different settings.
pub fn persist_config(layout: &ExperimentLayout, exp: &ExperimentConfig) -> Result<(), SelfEvolveError> {
    let path = layout.config_file();
    std::fs::create_dir_all(layout.root())
        .map_err(|e| SelfEvolveError::persistence(layout.root(), e))?;

    let current = serde_json::to_value(exp)?;
    if let Ok(previous) = std::fs::read_to_string(&path) {
        match serde_json::from_str::<serde_json::Value>(&previous) {
            Ok(prev) if prev == current => {}
            _ => tracing::warn!(
                path = %path.display(),
                "Experiment settings differ from the previous run; existing results were produced with the old settings"
            ),
        }
    }

    std::fs::write(&path, serde_json::to_string_pretty(&current)?)
        .map_err(|e| SelfEvolveError::persistence(&path, e))?;
    Ok(())
}

/// Run every sampled problem of every category, in order.
pub async fn run_problems(
    runner: &ProblemRunner,
    dataset: &Dataset,
    exp: &ExperimentConfig,
    seed: Option<u64>,
) -> Result<RunSummary, SelfEvolveError> {
    let mut rng = dataset::sampler(seed);
    let mut summary = RunSummary::default();

    for category in &exp.categories {
        let problems = dataset.category(category);
        if problems.is_empty() {
            tracing::warn!(category = %category, "No problems in dataset for category");
            continue;
        }
        let selected = dataset::sample(&problems, exp.sampling_fraction, &mut rng);
        tracing::info!(
            category = %category,
            selected = selected.len(),
            available = problems.len(),
            "Running category"
        );

        for problem in selected {
            let report = runner.run(problem).await?;
            if report.resumed {
                summary.resumed += 1;
            } else {
                summary.evaluated += 1;
            }
            if report.outcome == Outcome::Correct {
                summary.correct += 1;
            }
        }
    }
    Ok(summary)
}

pub async fn run_experiment(
    mut config: Config,
    args: RunArgs,
    env: &dyn EnvSource,
) -> anyhow::Result<()> {
    apply_overrides(&mut config, &args);
    let exp = experiment_config(&config)?;
    let layout = ExperimentLayout::new(&config.experiment.artifacts_dir, &exp.experiment_name);

    let dataset = Dataset::load(&config.dataset.path)?;
    let evaluator = Arc::new(HarnessEvaluator::from_config(&config.evaluator)?);

    let progress: Option<ProgressFn> = if args.quiet {
        None
    } else {
        Some(Arc::new(terminal_progress(args.demo)))
    };

    let mut registry = ProviderRegistry::new(config.providers.clone(), env);
    let prompts = Arc::new(PromptBuilder::new()?);
    let sampling = SamplingParams {
        temperature: exp.temperature,
        top_p: exp.top_p,
        max_tokens: config.generation.max_tokens,
    };

    // Passages are only used by a chain-of-thought initial stage.
    let retriever: Arc<dyn Retriever> = if exp.initial_strategy == Strategy::ChainOfThought {
        let embedder = match config.retrieval.backend {
            RetrievalBackend::Chroma => Some(registry.get(config.retrieval.embedding_provider)?),
            _ => None,
        };
        retrieval::build_retriever(&config.retrieval, embedder)?
    } else {
        Arc::new(NoRetrieval)
    };

    let mut build_client = |model: LlmModel| -> Result<GenerationClient, SelfEvolveError> {
        let mut client = GenerationClient::new(registry.get(model.provider())?, model, prompts.clone())?
            .with_sampling(sampling)
            .with_feedback_budget(config.generation.feedback_token_budget);
        if let Some(ref p) = progress {
            client = client.with_progress(p.clone());
        }
        Ok(client)
    };
    let initial_client = Arc::new(build_client(exp.initial_model)?.with_retriever(retriever));
    let correction_client = Arc::new(build_client(exp.correction_model)?);

    let mut correction = CorrectionLoop::new(
        initial_client,
        correction_client,
        evaluator,
        LoopSettings {
            initial_strategy: exp.initial_strategy,
            correction_strategy: exp.correction_strategy,
            self_correction: exp.self_correction,
            max_attempts: exp.max_attempts,
        },
    );
    if let Some(ref p) = progress {
        correction = correction.with_progress(p.clone());
    }
    let mut runner = ProblemRunner::new(correction, layout.clone())
        .with_cooldown(Duration::from_secs(config.experiment.cooldown_secs))
        .with_cooldown_on_resume(config.experiment.cooldown_on_resume);
    if let Some(ref p) = progress {
        runner = runner.with_progress(p.clone());
    }

    persist_config(&layout, &exp)?;
    tracing::info!(
        experiment = %exp.experiment_name,
        initial = %format!("{}/{}", exp.initial_strategy, exp.initial_model),
        correction = %format!("{}/{}", exp.correction_strategy, exp.correction_model),
        "Starting experiment"
    );

    let summary = run_problems(&runner, &dataset, &exp, config.experiment.seed).await?;
    tracing::info!(
        evaluated = summary.evaluated,
        resumed = summary.resumed,
        correct = summary.correct,
        "Experiment finished"
    );

    let percents = ExperimentAggregator::new(&layout)
        .with_categories(&exp.categories)
        .aggregate()?;
    print!("{}", render_table(&exp.experiment_name, &percents));
    Ok(())
}
