//! fds-aggregate - crowd label aggregation
//!
//! Loads crowd annotations, runs MV / DS / FDS / Hybrid aggregation and
//! writes one consensus label per question.
//!
//! Settings priority: command line, then environment, then TOML config file,
//! then built-in defaults.

use anyhow::{Context, Result};
use clap::Parser;
use fds_aggregate::output::{self, RunReport};
use fds_aggregate::{
    accuracy, aggregate, AggregateError, DataLoader, DatasetPaths, EstimatorParams, LoadMode,
};
use fds_common::config::{
    resolve_config, resolve_root_folder, write_toml_config, EstimatorConfig, TomlConfig,
    ROOT_FOLDER_ENV,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for fds-aggregate
#[derive(Parser, Debug)]
#[command(name = "fds-aggregate")]
#[command(about = "Aggregate crowdsourced labels with (Fast) Dawid-Skene EM")]
#[command(version)]
struct Args {
    /// Dataset name, read from <root>/data/<dataset>_dataset
    #[arg(long, default_value = "toy")]
    dataset: String,

    /// Directory holding crowd.csv and gold.csv
    #[arg(long)]
    dataset_path: Option<PathBuf>,

    /// Crowd annotations CSV (annotator,question,annotation)
    #[arg(long)]
    crowd_annotations_path: Option<PathBuf>,

    /// Ground truth CSV (question,annotation), test mode only
    #[arg(long)]
    ground_truths_path: Option<PathBuf>,

    /// Use only the first k annotations of each question (0 = all)
    #[arg(short, default_value_t = 0)]
    k: usize,

    /// `aggregate` or `test` (test mode reads ground truth and reports accuracy)
    #[arg(long, default_value = "aggregate")]
    mode: String,

    /// MV, DS, FDS or H
    #[arg(short, long)]
    algorithm: Option<String>,

    /// Write predictions CSV here
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write a JSON run report here
    #[arg(long)]
    report: Option<PathBuf>,

    /// Print predictions (and accuracy in test mode) to stdout
    #[arg(long)]
    print_result: bool,

    /// Seed for tie-breaking (defaults to the configured seed, 18 unless set)
    #[arg(long, env = "FDS_SEED")]
    seed: Option<u64>,

    /// `random` or `lowest-index`
    #[arg(long)]
    tie_break: Option<String>,

    /// Convergence threshold on class marginals
    #[arg(long)]
    tolerance: Option<f64>,

    /// Hybrid switch threshold on class marginals
    #[arg(long)]
    switch_tolerance: Option<f64>,

    /// Maximum number of EM iterations
    #[arg(long)]
    max_iterations: Option<usize>,

    /// TOML configuration file
    #[arg(short, long, env = "FDS_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder for dataset lookup (falls back to FDS_ROOT, then config)
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// Write a configuration template with default values and exit
    #[arg(long)]
    write_default_config: Option<PathBuf>,

    /// Debug logging (per-iteration diagnostics)
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(level: &str, verbose: bool) {
    let default_directives = |level: &str| format!("fds_aggregate={0},fds_common={0}", level);

    let filter = if verbose {
        EnvFilter::new(default_directives("debug"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Merge CLI overrides onto the configured estimator defaults
fn estimator_params(args: &Args, config: &EstimatorConfig) -> Result<EstimatorParams> {
    let params = EstimatorParams {
        algorithm: args
            .algorithm
            .as_deref()
            .unwrap_or(&config.algorithm)
            .parse()?,
        tolerance: args.tolerance.unwrap_or(config.tolerance),
        switch_tolerance: args.switch_tolerance.unwrap_or(config.switch_tolerance),
        max_iterations: args.max_iterations.unwrap_or(config.max_iterations),
        tie_break: args
            .tie_break
            .as_deref()
            .unwrap_or(&config.tie_break)
            .parse()?,
    };
    params.validate()?;
    Ok(params)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let resolved =
        resolve_config(args.config.as_deref()).context("Failed to load configuration")?;
    let config = resolved.config;
    init_logging(&config.logging.level, args.verbose);

    info!("Starting fds-aggregate {}", fds_aggregate::build_info());
    resolved.source.log();

    if let Some(path) = &args.write_default_config {
        write_toml_config(&TomlConfig::default(), path)
            .with_context(|| format!("Failed to write config template to {}", path.display()))?;
        info!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let params = estimator_params(&args, &config.estimator)?;
    let seed = args.seed.unwrap_or(config.estimator.seed);
    let mode: LoadMode = args.mode.parse()?;

    let root = resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, &config);
    let paths = DatasetPaths::resolve(
        &root,
        &args.dataset,
        args.dataset_path.as_deref(),
        args.crowd_annotations_path.as_deref(),
        args.ground_truths_path.as_deref(),
    );
    let loader = DataLoader::load(&paths, args.k, mode)
        .with_context(|| format!("Failed to load dataset '{}'", args.dataset))?;

    info!(
        algorithm = %params.algorithm,
        seed,
        k = args.k,
        "Running aggregation"
    );

    let responses = loader.responses();
    let mut rng = StdRng::seed_from_u64(seed);
    let aggregation = aggregate(&responses, &params, &mut rng).map_err(|e| {
        let context = match &e {
            AggregateError::NumericalInstability { item, iteration, .. } => {
                let question = responses
                    .keys()
                    .nth(*item)
                    .and_then(|&q| loader.questions().value(q))
                    .unwrap_or("<unknown>");
                format!(
                    "Numerical instability on question '{}' at iteration {}",
                    question, iteration
                )
            }
            _ => "Aggregation failed".to_string(),
        };
        anyhow::Error::new(e).context(context)
    })?;

    let accuracy = loader.gold().and_then(|gold| {
        let aligned: Vec<usize> = aggregation.items.iter().map(|&q| gold[q]).collect();
        accuracy(&aggregation.labels, &aligned)
    });

    let predictions = output::predictions(&aggregation, loader.questions(), loader.labels())?;

    if args.print_result {
        println!("Predictions:");
        print!("{}", output::format_predictions_table(&predictions));
        if mode == LoadMode::Test {
            if let Some(accuracy) = accuracy {
                println!("Accuracy:");
                println!("{:.4}", accuracy);
            }
        }
    }

    if let Some(path) = &args.output {
        output::write_predictions_csv(path, &predictions)
            .with_context(|| format!("Failed to write predictions to {}", path.display()))?;
        info!("Predictions written to {}", path.display());
    }

    if let Some(path) = &args.report {
        RunReport::new(&aggregation, loader.annotators(), loader.labels(), seed, accuracy)
            .write(path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    if let Some(accuracy) = accuracy {
        info!(accuracy, "Accuracy against ground truth");
    }

    Ok(())
}
