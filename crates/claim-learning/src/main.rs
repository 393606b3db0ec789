//! CLI entry point for the claim approval pipeline.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use claim_learning::{InferencePipeline, RunOutcome, RunSummary, TrainingPipeline};
use claim_processing::{
    ApplicantForm, ArtifactStore, CsvSource, FileSystemStore, Gender, PipelineConfig, PipelineConfigBuilder, Record,
    SyntheticClaims, VehicleAge,
};
use dotenv::dotenv;
use polars::prelude::{CsvWriter, SerWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// CLI-compatible gender enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliGender {
    Male,
    Female,
}

impl From<CliGender> for Gender {
    fn from(cli: CliGender) -> Self {
        match cli {
            CliGender::Male => Gender::Male,
            CliGender::Female => Gender::Female,
        }
    }
}

/// CLI-compatible vehicle age enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliVehicleAge {
    /// Less than one year
    #[value(name = "lt-1", alias = "<1")]
    LessThanOneYear,
    /// Between one and two years
    #[value(name = "1-2")]
    OneToTwoYears,
    /// More than two years
    #[value(name = "gt-2", alias = ">2")]
    MoreThanTwoYears,
}

impl From<CliVehicleAge> for VehicleAge {
    fn from(cli: CliVehicleAge) -> Self {
        match cli {
            CliVehicleAge::LessThanOneYear => VehicleAge::LessThanOneYear,
            CliVehicleAge::OneToTwoYears => VehicleAge::OneToTwoYears,
            CliVehicleAge::MoreThanTwoYears => VehicleAge::MoreThanTwoYears,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliDamage {
    Yes,
    No,
}

#[derive(Parser, Debug)]
#[command(
    name = "claim-pipeline",
    version,
    about = "Train, deploy and query the vehicle-insurance claim approval model",
    after_help = "ENVIRONMENT VARIABLES:\n  \
                  CLAIM_ARTIFACTS_DIR   Root directory of the artifact store\n  \
                  RUST_LOG              Overrides --log-level\n\n\
                  EXAMPLES:\n  \
                  # Generate synthetic data and train on it\n  \
                  claim-pipeline generate --rows 5000 --output claims.csv\n  \
                  claim-pipeline train --source claims.csv\n\n  \
                  # Score one applicant\n  \
                  claim-pipeline predict --gender male --age 30 --driving-license 1 \\\n    \
                  --region-code 28 --previously-insured 0 --vehicle-age 1-2 --vehicle-damage yes \\\n    \
                  --annual-premium 30000 --policy-sales-channel 152 --vintage 150"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Root directory of the artifact store
    ///
    /// Overrides `artifacts_dir` from the config file.
    #[arg(long, global = true, env = "CLAIM_ARTIFACTS_DIR")]
    artifacts_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Only show warnings, errors and the final result
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the training pipeline on a CSV file of raw claims
    Train(TrainArgs),
    /// Predict claim approval for one applicant using the deployed model
    Predict(PredictArgs),
    /// Write synthetic raw claims to a CSV file
    Generate(GenerateArgs),
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// CSV file with raw claim records
    #[arg(short, long)]
    source: PathBuf,

    /// JSON configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fraction of rows used for training (0.0 - 1.0, exclusive)
    #[arg(long)]
    train_ratio: Option<f64>,

    /// Minimum training accuracy
    #[arg(long)]
    expected_accuracy: Option<f64>,

    /// Minimum F1 gain over the deployed model
    #[arg(long)]
    min_improvement: Option<f64>,

    /// Number of trees
    #[arg(long)]
    n_estimators: Option<usize>,

    /// Maximum tree depth
    #[arg(long)]
    max_depth: Option<usize>,

    /// Seed of the train/test split
    #[arg(long)]
    seed: Option<u64>,

    /// Seed of the forest
    #[arg(long)]
    random_state: Option<u64>,

    /// Print the run summary as JSON instead of a human-readable report
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct PredictArgs {
    /// JSON configuration file; only `artifacts_dir` is read from it
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    gender: CliGender,

    /// Applicant age (18 - 100)
    #[arg(long)]
    age: u32,

    /// 1 if the applicant holds a driving license
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=1))]
    driving_license: u8,

    /// Region code (0 - 52)
    #[arg(long)]
    region_code: u32,

    /// 1 if the applicant already holds vehicle insurance
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=1))]
    previously_insured: u8,

    #[arg(long, value_enum)]
    vehicle_age: CliVehicleAge,

    /// Whether the vehicle was damaged in the past
    #[arg(long, value_enum)]
    vehicle_damage: CliDamage,

    /// Annual premium (2000 - 100000)
    #[arg(long)]
    annual_premium: f64,

    /// Policy sales channel code (1 - 200)
    #[arg(long)]
    policy_sales_channel: u32,

    /// Days the applicant has been a customer (10 - 300)
    #[arg(long)]
    vintage: u32,

    /// Print the prediction as JSON
    #[arg(long)]
    json: bool,
}

impl From<&PredictArgs> for ApplicantForm {
    fn from(args: &PredictArgs) -> Self {
        ApplicantForm {
            gender: args.gender.into(),
            age: args.age,
            has_driving_license: args.driving_license == 1,
            region_code: args.region_code,
            previously_insured: args.previously_insured == 1,
            vehicle_age: args.vehicle_age.into(),
            vehicle_damage: matches!(args.vehicle_damage, CliDamage::Yes),
            annual_premium: args.annual_premium,
            policy_sales_channel: args.policy_sales_channel,
            vintage: args.vintage,
        }
    }
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[arg(short, long, default_value = "1000")]
    rows: usize,

    #[arg(short, long, default_value = "7")]
    seed: u64,

    /// Share of labels flipped against the generating rule
    #[arg(long, default_value = "0.05")]
    noise: f64,

    /// Share of Age and Annual_Premium values left empty
    #[arg(long, default_value = "0.0")]
    missing_rate: f64,

    #[arg(short, long)]
    output: PathBuf,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is disabled so stdout only carries JSON.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    // Load .env before parsing so CLAIM_ARTIFACTS_DIR can come from it
    dotenv().ok();

    let cli = Cli::parse();
    let json = match &cli.command {
        Command::Train(args) => args.json,
        Command::Predict(args) => args.json,
        Command::Generate(_) => false,
    };
    init_logging(&cli.log_level, cli.quiet, json);

    match &cli.command {
        Command::Train(args) => run_train(&cli, args),
        Command::Predict(args) => run_predict(&cli, args),
        Command::Generate(args) => run_generate(args),
    }
}

/// Config file (or defaults) with CLI overrides applied.
fn build_config(cli: &Cli, args: &TrainArgs) -> Result<PipelineConfig> {
    let base = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };

    let mut builder = PipelineConfigBuilder::from_config(base);
    if let Some(ratio) = args.train_ratio {
        builder = builder.train_ratio(ratio);
    }
    if let Some(accuracy) = args.expected_accuracy {
        builder = builder.expected_accuracy(accuracy);
    }
    if let Some(threshold) = args.min_improvement {
        builder = builder.min_improvement(threshold);
    }
    if let Some(n) = args.n_estimators {
        builder = builder.n_estimators(n);
    }
    if let Some(depth) = args.max_depth {
        builder = builder.max_depth(depth);
    }
    if let Some(seed) = args.seed {
        builder = builder.split_seed(seed);
    }
    if let Some(seed) = args.random_state {
        builder = builder.random_state(seed);
    }
    if let Some(dir) = &cli.artifacts_dir {
        builder = builder.artifacts_dir(dir);
    }

    Ok(builder.build()?)
}

fn run_train(cli: &Cli, args: &TrainArgs) -> Result<()> {
    let config = build_config(cli, args)?;
    info!("Artifacts directory: {}", config.artifacts_dir.display());

    let show_progress = !cli.quiet && !args.json;
    let pipeline = TrainingPipeline::builder()
        .config(config)
        .source(Arc::new(CsvSource::new(&args.source)))
        .on_progress(move |update| {
            if show_progress {
                eprintln!("[{:>3.0}%] {}", update.progress * 100.0, update.message);
            }
        })
        .build()?;

    let summary = pipeline.run().map_err(|e| {
        let code = e.error_code();
        anyhow::Error::new(e).context(format!("training run failed [{code}]"))
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

/// Human-readable run report.
///
/// Uses `println!` on purpose: this is the command's output, not a log line.
fn print_summary(summary: &RunSummary) {
    println!("\n{}", "=".repeat(60));
    println!("TRAINING RUN {}", summary.run_id);
    println!("{}", "=".repeat(60));

    if let Some(ingestion) = &summary.ingestion {
        println!(
            "  Rows:        {} ({} train / {} test)",
            ingestion.rows, ingestion.train_rows, ingestion.test_rows
        );
    }
    if let Some(report) = &summary.validation {
        println!("  Validation:  {}", report.message);
    }
    if let Some(training) = &summary.training {
        println!(
            "  Train:       accuracy {:.4}, f1 {:.4}",
            training.train_metrics.accuracy, training.train_metrics.f1_score
        );
    }
    if let Some(evaluation) = &summary.evaluation {
        let current = evaluation
            .current_score
            .map_or_else(|| "none".to_string(), |s| format!("{s:.4}"));
        println!(
            "  Evaluation:  new F1 {:.4}, deployed F1 {}",
            evaluation.new_score, current
        );
    }

    let outcome = match summary.outcome {
        Some(RunOutcome::Deployed) => "DEPLOYED",
        Some(RunOutcome::Rejected) => "REJECTED (deployed model kept)",
        Some(RunOutcome::ValidationFailed) => "HALTED (validation failed)",
        None => "FAILED",
    };
    println!("  Outcome:     {}", outcome);
    println!("  Duration:    {:.2}s", summary.duration_seconds);
}

/// Store root for commands that only read artifacts.
///
/// `--artifacts-dir` (or `CLAIM_ARTIFACTS_DIR`) wins over the config file.
fn resolve_artifacts_dir(cli_dir: Option<&Path>, config: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = cli_dir {
        return Ok(dir.to_path_buf());
    }
    Ok(match config {
        Some(path) => PipelineConfig::from_json_file(path)?.artifacts_dir,
        None => PipelineConfig::default().artifacts_dir,
    })
}

fn run_predict(cli: &Cli, args: &PredictArgs) -> Result<()> {
    let artifacts_dir = resolve_artifacts_dir(cli.artifacts_dir.as_deref(), args.config.as_deref())?;
    info!("Artifacts directory: {}", artifacts_dir.display());
    let store: Arc<dyn ArtifactStore> = Arc::new(FileSystemStore::new(artifacts_dir));

    let record = Record::from(ApplicantForm::from(args));
    let prediction = InferencePipeline::new(store)
        .predict_detailed(&record)
        .map_err(|e| {
            let code = e.error_code();
            anyhow::Error::new(e).context(format!("prediction failed [{code}]"))
        })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&prediction)?);
    } else if prediction.approved {
        println!("APPROVED (p = {:.3})", prediction.probability);
    } else {
        println!("REJECTED (p = {:.3})", prediction.probability);
    }
    Ok(())
}

fn run_generate(args: &GenerateArgs) -> Result<()> {
    let mut df = SyntheticClaims::new(args.rows, args.seed)
        .noise(args.noise)
        .missing_rate(args.missing_rate)
        .generate()?;

    let file = std::fs::File::create(&args.output)
        .with_context(|| format!("Cannot create {}", args.output.display()))?;
    CsvWriter::new(file).include_header(true).finish(&mut df)?;
    info!("Wrote {} synthetic rows to {}", df.height(), args.output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREDICT: [&str; 22] = [
        "claim-pipeline",
        "predict",
        "--gender",
        "female",
        "--age",
        "30",
        "--driving-license",
        "1",
        "--region-code",
        "28",
        "--previously-insured",
        "0",
        "--vehicle-age",
        "1-2",
        "--vehicle-damage",
        "yes",
        "--annual-premium",
        "30000",
        "--policy-sales-channel",
        "152",
        "--vintage",
        "150",
    ];

    fn predict_args(cli: &Cli) -> &PredictArgs {
        match &cli.command {
            Command::Predict(args) => args,
            other => panic!("expected predict, got {other:?}"),
        }
    }

    #[test]
    fn test_predict_reads_store_root_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("cfg.json");
        std::fs::write(&config_path, r#"{"artifacts_dir": "/srv/claims"}"#).unwrap();

        let mut argv: Vec<&str> = PREDICT.to_vec();
        let config_arg = config_path.to_str().unwrap();
        argv.extend(["--config", config_arg]);
        let cli = Cli::try_parse_from(argv).unwrap();
        let args = predict_args(&cli);

        let resolved = resolve_artifacts_dir(None, args.config.as_deref()).unwrap();
        assert_eq!(resolved, PathBuf::from("/srv/claims"));

        // An explicit directory still wins.
        let resolved = resolve_artifacts_dir(Some(Path::new("elsewhere")), args.config.as_deref()).unwrap();
        assert_eq!(resolved, PathBuf::from("elsewhere"));
    }

    #[test]
    fn test_predict_defaults_without_config() {
        let resolved = resolve_artifacts_dir(None, None).unwrap();
        assert_eq!(resolved, PipelineConfig::default().artifacts_dir);
    }

    #[test]
    fn test_predict_rejects_fractional_codes() {
        let mut argv: Vec<&str> = PREDICT.to_vec();
        argv[9] = "28.5";
        assert!(Cli::try_parse_from(argv).is_err());

        let cli = Cli::try_parse_from(PREDICT).unwrap();
        let record = Record::from(ApplicantForm::from(predict_args(&cli)));
        assert_eq!(record.region_code, 28);
        assert_eq!(record.policy_sales_channel, 152);
    }
}
