// src/cli/mod.rs — CLI definition (clap derive)

pub mod models;
pub mod progress;
pub mod report;
pub mod run;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::core::types::Strategy;
use crate::provider::LlmModel;

#[derive(Parser)]
#[command(
    name = "selfevolve",
    about = "Self-correcting code generation on data-science benchmarks",
    version
)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run an experiment, resuming any problems already evaluated
    Run(RunArgs),
    /// Recompute result.json from the records on disk
    Report {
        /// Experiment name (defaults to the configured one)
        #[arg(short = 'n', long)]
        experiment: Option<String>,
        /// Root of the artifacts tree
        #[arg(long)]
        artifacts_dir: Option<PathBuf>,
    },
    /// List supported models and the credentials each needs
    Models,
}

/// Flags for `run`. Each one overrides the matching config-file value.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Experiment name; also the artifacts subdirectory
    #[arg(short = 'n', long)]
    pub experiment: Option<String>,

    /// Categories to run (comma separated)
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    pub categories: Option<Vec<String>>,

    /// Fraction of each category to sample (0, 1]
    #[arg(long)]
    pub sampling_fraction: Option<f64>,

    /// Seed for sampling
    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long, value_enum)]
    pub initial_strategy: Option<Strategy>,

    #[arg(long, value_enum)]
    pub correction_strategy: Option<Strategy>,

    #[arg(long, value_enum)]
    pub initial_model: Option<LlmModel>,

    #[arg(long, value_enum)]
    pub correction_model: Option<LlmModel>,

    #[arg(long)]
    pub temperature: Option<f32>,

    #[arg(long)]
    pub top_p: Option<f32>,

    /// Correct failed attempts using harness feedback
    #[arg(long, overrides_with = "no_self_correction")]
    pub self_correction: bool,

    /// Stop after the initial attempt
    #[arg(long, overrides_with = "self_correction")]
    pub no_self_correction: bool,

    /// Generation attempts per problem, initial one included
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Seconds to pause after each evaluated problem
    #[arg(long)]
    pub cooldown_secs: Option<u64>,

    /// Dataset JSONL file
    #[arg(long)]
    pub dataset: Option<PathBuf>,

    /// Root of the artifacts tree
    #[arg(long)]
    pub artifacts_dir: Option<PathBuf>,

    /// Echo retrieved passages, hints and generated code; silence logs
    #[arg(long)]
    pub demo: bool,

    /// Suppress progress output (only print the final table)
    #[arg(long)]
    pub quiet: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "selfevolve",
            "run",
            "-n",
            "cot-gpt4o",
            "--categories",
            "Numpy,Pandas",
            "--initial-strategy",
            "cot",
            "--initial-model",
            "openai-gpt-4o",
            "--max-attempts",
            "3",
            "--no-self-correction",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.experiment.as_deref(), Some("cot-gpt4o"));
        assert_eq!(
            args.categories,
            Some(vec!["Numpy".to_string(), "Pandas".to_string()])
        );
        assert_eq!(args.initial_strategy, Some(Strategy::ChainOfThought));
        assert_eq!(args.initial_model, Some(LlmModel::OpenAIGpt4o));
        assert_eq!(args.max_attempts, Some(3));
        assert!(args.no_self_correction);
        assert!(!args.self_correction);
        assert!(!args.demo);
    }

    #[test]
    fn test_self_correction_flags_last_wins() {
        let run = |flags: &[&str]| {
            let mut argv = vec!["selfevolve", "run"];
            argv.extend_from_slice(flags);
            match Cli::try_parse_from(argv).unwrap().command {
                Commands::Run(args) => (args.self_correction, args.no_self_correction),
                _ => panic!("expected run"),
            }
        };
        assert_eq!(run(&[]), (false, false));
        assert_eq!(run(&["--self-correction"]), (true, false));
        assert_eq!(run(&["--self-correction", "--no-self-correction"]), (false, true));
        assert_eq!(run(&["--no-self-correction", "--self-correction"]), (true, false));
    }

    #[test]
    fn test_unknown_model_rejected() {
        assert!(Cli::try_parse_from(["selfevolve", "run", "--initial-model", "gpt-5"]).is_err());
        assert!(Cli::try_parse_from(["selfevolve", "run", "--correction-strategy", "fewshot"]).is_err());
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["selfevolve", "report", "--config", "exp.toml", "-n", "baseline"])
            .unwrap();
        assert_eq!(cli.config.as_deref(), Some("exp.toml"));
        assert!(matches!(cli.command, Commands::Report { ref experiment, .. } if experiment.as_deref() == Some("baseline")));
    }
}
