//! CLI entry point for the text transformation pipeline.

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use dotenv::dotenv;
use lex_text::jobs::load_record;
use lex_text::{
    ArtifactFormat, DatasetSource, EngineConfig, FileId, JobState, JobStatus, PipelineConfig,
    PipelineService, UploadDirectory, ValidatedPipeline, validate,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info};

/// CLI-compatible artifact format enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliFormat {
    /// Delimited text, nested cells as JSON text
    Csv,
    /// One JSON object per row
    Jsonl,
    /// Columnar, nested cells as list columns
    Parquet,
}

impl From<CliFormat> for ArtifactFormat {
    fn from(cli: CliFormat) -> Self {
        match cli {
            CliFormat::Csv => ArtifactFormat::Csv,
            CliFormat::Jsonl => ArtifactFormat::Jsonl,
            CliFormat::Parquet => ArtifactFormat::Parquet,
        }
    }
}

/// Text transformation pipelines over tabular datasets
#[derive(Parser, Debug)]
#[command(
    name = "lex-text",
    version,
    about = "Run NLP transformation pipelines over a text column",
    after_help = "ENVIRONMENT VARIABLES:\n  \
                  LEX_TEXT_OUTPUT       Default output directory for results\n  \
                  LEX_TEXT_STATUS_DIR   Directory for durable job status records\n  \
                  LEX_TEXT_BATCH_SIZE   Rows per batch when the pipeline sets none\n  \
                  LEX_TEXT_FORMAT       Result format (csv, jsonl)\n  \
                  RUST_LOG              Overrides --log-level\n\n\
                  EXAMPLES:\n  \
                  # Check a pipeline against a dataset\n  \
                  lex-text validate -i reviews.csv -c pipeline.json\n\n  \
                  # Run it and write processed_reviews.csv to ./outputs\n  \
                  lex-text run -i reviews.csv -c pipeline.json -o outputs/\n\n  \
                  # Inspect a persisted job record\n  \
                  lex-text status --status-dir status/ --file-id reviews"
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output JSON to stdout instead of human-readable summary
    ///
    /// Disables all logging; only the final JSON document is written.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a pipeline config against a dataset without running it
    Validate(PipelineArgs),
    /// Run a pipeline and wait for the job to finish
    Run(RunArgs),
    /// Print a persisted job status record
    Status(StatusArgs),
}

#[derive(Args, Debug)]
struct PipelineArgs {
    /// Dataset file (.csv, .tsv, .txt, .jsonl, .ndjson, .json, .parquet, .xlsx, .xls, .ods)
    ///
    /// The file stem is used as the file id.
    #[arg(short, long)]
    input: PathBuf,

    /// Pipeline config as JSON
    #[arg(short, long)]
    config: PathBuf,

    /// Rows per batch when the pipeline config sets none
    #[arg(long, env = "LEX_TEXT_BATCH_SIZE", default_value_t = lex_text::config::DEFAULT_BATCH_SIZE)]
    batch_size: usize,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Output directory for results
    #[arg(short, long, env = "LEX_TEXT_OUTPUT", default_value = "./outputs")]
    output: PathBuf,

    /// Directory for durable job status records
    #[arg(long, env = "LEX_TEXT_STATUS_DIR")]
    status_dir: Option<PathBuf>,

    /// Result artifact format
    #[arg(long, value_enum, env = "LEX_TEXT_FORMAT", default_value = "csv")]
    format: CliFormat,
}

#[derive(Args, Debug)]
struct StatusArgs {
    /// Directory holding processing_{file_id}.json records
    #[arg(long, env = "LEX_TEXT_STATUS_DIR")]
    status_dir: PathBuf,

    /// File id of the job
    #[arg(long)]
    file_id: String,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
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
        .init();
}

fn main() -> Result<()> {
    // .env values must be visible before clap reads env-backed flags
    dotenv().ok();

    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.quiet, cli.json);

    match &cli.command {
        Command::Validate(args) => run_validate(&cli, args),
        Command::Run(args) => run_pipeline(&cli, args),
        Command::Status(args) => run_status(&cli, args),
    }
}

/// Resolve the input file into an upload directory and a file id.
fn dataset_location(input: &Path) -> Result<(UploadDirectory, FileId)> {
    if !input.is_file() {
        bail!("Input file not found: {}", input.display());
    }
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("Cannot derive a file id from {}", input.display()))?;
    let file_id = FileId::parse(stem)?;
    let dir = match input.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((UploadDirectory::new(dir), file_id))
}

fn read_pipeline_config(path: &Path) -> Result<PipelineConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read pipeline config {}", path.display()))?;
    let config = serde_json::from_str(&text)
        .with_context(|| format!("Invalid pipeline config JSON in {}", path.display()))?;
    Ok(config)
}

fn run_validate(cli: &Cli, args: &PipelineArgs) -> Result<()> {
    let (uploads, file_id) = dataset_location(&args.input)?;
    let config = read_pipeline_config(&args.config)?;
    let schema = uploads.schema(&file_id)?;
    debug!(
        "Schema for '{}': {:?}",
        file_id,
        schema.names().collect::<Vec<_>>()
    );

    match validate(&schema, &config, args.batch_size) {
        Ok(plan) => {
            if cli.json {
                let outputs: Vec<_> = plan.outputs().collect();
                let doc = serde_json::json!({
                    "valid": true,
                    "steps": plan.steps.len(),
                    "batch_size": plan.batch_size,
                    "outputs": outputs,
                    "output_column": plan.output_column,
                });
                println!("{}", serde_json::to_string_pretty(&doc)?);
            } else {
                print_plan(&file_id, &plan);
            }
            Ok(())
        }
        Err(errors) => {
            if cli.json {
                let doc = serde_json::json!({"valid": false, "errors": &errors});
                println!("{}", serde_json::to_string_pretty(&doc)?);
            } else {
                println!("\n{}", "=".repeat(80));
                println!("PIPELINE INVALID - {} problem(s)", errors.len());
                println!("{}", "=".repeat(80));
                for error in &errors {
                    println!("  - [{}] {}", error.code(), error);
                }
                println!();
            }
            Err(anyhow!("Pipeline config is invalid"))
        }
    }
}

fn print_plan(file_id: &FileId, plan: &ValidatedPipeline) {
    println!("\n{}", "=".repeat(80));
    println!("PIPELINE VALID - '{}'", file_id);
    println!("{}", "=".repeat(80));
    println!("  Input column: {}", plan.input_column);
    println!("  Batch size:   {}", plan.batch_size);
    println!();
    println!("{:<6} {:<28} {:<20} {:<20}", "Step", "Transformation", "Input", "Output");
    println!("{}", "-".repeat(76));
    for step in &plan.steps {
        for binding in &step.bindings {
            println!(
                "{:<6} {:<28} {:<20} {:<20}",
                step.index,
                step.kind().display_name(),
                binding.input,
                binding.output
            );
        }
    }
    println!();
}

fn run_pipeline(cli: &Cli, args: &RunArgs) -> Result<()> {
    let (uploads, file_id) = dataset_location(&args.pipeline.input)?;
    let config = read_pipeline_config(&args.pipeline.config)?;

    if !args.output.exists() {
        std::fs::create_dir_all(&args.output)?;
        info!("Created output directory: {}", args.output.display());
    }

    let mut engine = EngineConfig::builder()
        .uploads_dir(uploads.dir())
        .results_dir(&args.output)
        .default_batch_size(args.pipeline.batch_size)
        .artifact_format(args.format.into());
    if let Some(dir) = &args.status_dir {
        engine = engine.status_dir(dir);
    }

    let quiet = cli.quiet || cli.json;
    let service = PipelineService::builder()
        .config(engine.build()?)
        .datasets(uploads)
        .on_progress(move |update| {
            if !quiet {
                info!(
                    "[{:>3.0}%] {}: {}",
                    update.progress * 100.0,
                    update.stage.display_name(),
                    update.message
                );
            }
        })
        .build()?;

    info!("{}", "=".repeat(80));
    info!("Starting text pipeline for '{}'...", file_id);
    info!("{}", "=".repeat(80));

    let handle = service.submit(file_id, config)?;
    let status = loop {
        let status = service.wait_for_terminal(&handle.file_id, Duration::from_secs(1))?;
        if status.state.is_terminal() {
            break status;
        }
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status);
    }

    match status.state {
        JobState::Completed => Ok(()),
        _ => {
            let message = status
                .error
                .as_ref()
                .map(|e| format!("{}: {}", e.code, e.message))
                .unwrap_or_else(|| "job did not complete".to_string());
            error!("Pipeline failed: {}", message);
            Err(anyhow!("Pipeline failed: {}", message))
        }
    }
}

fn run_status(cli: &Cli, args: &StatusArgs) -> Result<()> {
    let file_id = FileId::parse(args.file_id.as_str())?;
    let record = load_record(&args.status_dir, &file_id)?
        .ok_or_else(|| anyhow!("No status record for '{}' in {}", file_id, args.status_dir.display()))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_status(&record.status);
        println!("  Steps:       {}", record.config.transformations.len());
        println!("  Input:       {}", record.config.input_column);
        println!();
    }
    Ok(())
}

fn print_status(status: &JobStatus) {
    println!("\n{}", "=".repeat(80));
    println!("JOB '{}' - {}", status.file_id, status.state.as_str().to_uppercase());
    println!("{}", "=".repeat(80));
    match status.total_rows {
        Some(total) => println!("  Rows:        {}/{}", status.processed_rows, total),
        None => println!("  Rows:        {}", status.processed_rows),
    }
    println!("  Progress:    {:.0}%", status.progress * 100.0);
    println!("  Message:     {}", status.message);
    if let Some(finished) = status.finished_at {
        let elapsed = finished - status.started_at.unwrap_or(status.submitted_at);
        println!("  Duration:    {} ms", elapsed.num_milliseconds());
    }
    if let Some(result) = &status.result {
        println!("  Artifact:    {}", result.location);
        if let Some(manifest) = &result.manifest {
            println!("  Manifest:    {}", manifest);
        }
        println!("  Columns:     {}", result.columns.join(", "));
    }
    if let Some(error) = &status.error {
        match error.row {
            Some(row) => println!("  Error:       [{}] {} (row {})", error.code, error.message, row),
            None => println!("  Error:       [{}] {}", error.code, error.message),
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> String {
        format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
    }

    #[test]
    fn test_validate_fixture_pipeline() {
        let cli = Cli::try_parse_from([
            "lex-text",
            "--json",
            "validate",
            "--input",
            &fixture("reviews.csv"),
            "--config",
            &fixture("pipeline.json"),
        ])
        .unwrap();
        let Command::Validate(args) = &cli.command else {
            panic!("expected validate");
        };
        run_validate(&cli, args).unwrap();
    }

    #[test]
    fn test_parquet_format_flag() {
        let cli = Cli::try_parse_from([
            "lex-text",
            "run",
            "--input",
            &fixture("reviews.csv"),
            "--config",
            &fixture("pipeline.json"),
            "--format",
            "parquet",
        ])
        .unwrap();
        let Command::Run(args) = &cli.command else {
            panic!("expected run");
        };
        assert_eq!(ArtifactFormat::from(args.format), ArtifactFormat::Parquet);
    }
}
