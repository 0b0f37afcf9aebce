// src/main.rs — selfevolve entry point

use std::path::Path;

use clap::Parser;

use selfevolve::cli::{Cli, Commands};
use selfevolve::infra::config::Config;
use selfevolve::infra::logger;
use selfevolve::provider::resolver::ProcessEnv;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Demo mode keeps the terminal for passages, hints and code.
    let level = match &cli.command {
        Commands::Run(args) if args.demo => "error",
        _ => "warn",
    };
    logger::init_logging(level);

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Falls back to defaults if no config file is found
    let config = match cli.config {
        Some(ref path) => Config::load_from(Path::new(path))?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Run(args) => selfevolve::cli::run::run_experiment(config, args, &ProcessEnv).await,
        Commands::Report {
            experiment,
            artifacts_dir,
        } => selfevolve::cli::report::run_report(&config, experiment, artifacts_dir),
        Commands::Models => {
            print!("{}", selfevolve::cli::models::render_models());
            Ok(())
        }
    }
}
