use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use gs_data::{CsvCohortBuilder, ResultStore};
use gs_engine::logging::init_logging;
use gs_engine::SweepEngine;
use gs_optimizer::CentroidScorer;
use gs_types::{ExperimentId, SweepConfig, UniverseKind};

/// Exit status when the sweep ran but no task produced a score.
const EXIT_NO_SUCCESS: i32 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "grid-search",
    about = "Score every combination of a feature catalog and report the best",
    version
)]
struct Cli {
    /// Cohort CSV (patient, experiment, hour, label, then one column per feature)
    #[arg(long)]
    cohort: PathBuf,

    /// Feature catalog to sweep: narrow (alias flow_time) or broad
    #[arg(long = "feature-set")]
    feature_set: Option<UniverseKind>,

    /// Hours of data after the anchor event to include
    #[arg(long = "post-hour", visible_alias = "sp")]
    post_hour: Option<u32>,

    /// Experiment number(s) to pool, e.g. 1 or 1+3
    #[arg(short, long)]
    experiment: Option<ExperimentId>,

    /// Worker threads (defaults to all available cores)
    #[arg(long)]
    threads: Option<usize>,

    /// Comma-separated fold counts to cross-validate with
    #[arg(long, value_delimiter = ',')]
    folds: Option<Vec<u32>>,

    /// Root directory of the dataset cache
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Directory receiving the result artifact
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// JSON config file; command-line flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also write the results as pretty JSON to this path
    #[arg(long)]
    json: Option<PathBuf>,
}

impl Cli {
    fn sweep_config(&self) -> anyhow::Result<SweepConfig> {
        let mut config = match &self.config {
            Some(path) => SweepConfig::from_json_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => SweepConfig::default(),
        };

        if let Some(universe) = self.feature_set {
            config.universe = universe;
        }
        if let Some(post_hour) = self.post_hour {
            config.post_hour = post_hour;
        }
        if let Some(experiment) = &self.experiment {
            config.experiment = experiment.clone();
        }
        if let Some(threads) = self.threads {
            config.workers = Some(threads);
        }
        if let Some(folds) = &self.folds {
            config.fold_counts = folds.clone();
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(dir) = &self.out_dir {
            config.output_dir = dir.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() {
    init_logging("info");

    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(EXIT_NO_SUCCESS),
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}

/// Returns whether any task completed successfully.
fn run() -> anyhow::Result<bool> {
    let cli = Cli::parse();
    let config = cli.sweep_config()?;

    let builder = CsvCohortBuilder::from_path(&cli.cohort)
        .with_context(|| format!("loading cohort {}", cli.cohort.display()))?;
    let engine = SweepEngine::new(config)?;
    let report = engine.run(&builder, &CentroidScorer::new())?;

    if let Some(path) = &cli.json {
        ResultStore::new(&engine.config().output_dir)?.export_json(&report.outcome, path)?;
    }

    print!("{}", report.summary());
    println!("Results written to {}", report.artifact.display());

    Ok(report.succeeded())
}
