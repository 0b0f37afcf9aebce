// src/cli/report.rs — `selfevolve report`: re-aggregate an experiment's records

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::core::aggregate::ExperimentAggregator;
use crate::infra::config::Config;
use crate::infra::paths::ExperimentLayout;

pub fn run_report(
    config: &Config,
    experiment: Option<String>,
    artifacts_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let name = experiment.unwrap_or_else(|| config.experiment.name.clone());
    let artifacts = artifacts_dir.unwrap_or_else(|| config.experiment.artifacts_dir.clone());
    let layout = ExperimentLayout::new(&artifacts, &name);

    if !layout.root().is_dir() {
        anyhow::bail!("no experiment at {}", layout.root().display());
    }

    let percents = ExperimentAggregator::new(&layout).aggregate()?;
    print!("{}", render_table(&name, &percents));
    Ok(())
}

/// Plain-text accuracy table, one row per category.
pub fn render_table(experiment: &str, percents: &BTreeMap<String, f64>) -> String {
    let width = percents
        .keys()
        .map(|k| k.len())
        .max()
        .unwrap_or(0)
        .max("Category".len());

    let mut out = format!("Experiment: {}\n", experiment);
    out.push_str(&format!("{:<width$}  {:>8}\n", "Category", "Accuracy"));
    out.push_str(&format!("{}\n", "─".repeat(width + 10)));
    if percents.is_empty() {
        out.push_str("(no results)\n");
    }
    for (category, percent) in percents {
        out.push_str(&format!("{:<width$}  {:>7.2}%\n", category, percent));
    }
    out
}
