//! Comfort CLI - Command-line interface for Comfort Insights
//!
//! Commands:
//! - run: Run the pipeline over both datasets and export the tables
//! - validate: Check dataset columns and row values without running
//! - schema: Print stage columns and dependencies

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use comfort_insights::schema::{COMFORT_FOOD_SCHEMA, RESPONDENT_SCHEMA};
use comfort_insights::types::{ComfortFoodEntry, RespondentRecord};
use comfort_insights::{
    DatasetAdapter, InsightsPipeline, PipelineConfig, PipelineError, SnapshotEncoder, Stage,
    ValidationReport, PRODUCER_NAME, VERSION,
};

/// Comfort - Scoring and alignment pipeline for comfort-food survey data
#[derive(Parser)]
#[command(name = "comfort")]
#[command(version = VERSION)]
#[command(about = "Classify, score and aggregate comfort-food survey responses", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and export its tables
    Run {
        /// Respondent dataset (use - for stdin)
        #[arg(short, long)]
        respondents: PathBuf,

        /// Comfort-food dataset
        #[arg(short, long)]
        comfort_foods: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Write one file per stage into this directory instead
        #[arg(long, conflicts_with_all = ["output", "table"])]
        out_dir: Option<PathBuf>,

        /// Export a single stage's table
        #[arg(long)]
        table: Option<Stage>,

        /// TOML configuration file
        #[arg(long, env = "COMFORT_CONFIG")]
        config: Option<PathBuf>,

        /// Classify and score on all cores
        #[arg(long)]
        parallel: bool,

        /// Input format (overrides config)
        #[arg(long)]
        input_format: Option<InputFormat>,

        /// Output format (overrides config)
        #[arg(long)]
        output_format: Option<OutputFormat>,

        /// Omit run id and timestamp from the export
        #[arg(long)]
        no_provenance: bool,
    },

    /// Validate datasets without running the pipeline
    Validate {
        /// Respondent dataset (use - for stdin)
        #[arg(short, long)]
        respondents: PathBuf,

        /// Comfort-food dataset
        #[arg(short, long)]
        comfort_foods: Option<PathBuf>,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print stage columns and dependencies
    Schema {
        /// Only this stage
        #[arg(long)]
        stage: Option<Stage>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum InputFormat {
    /// JSON array of rows
    Json,
    /// Newline-delimited JSON (one row per line)
    Ndjson,
}

impl From<InputFormat> for comfort_insights::InputFormat {
    fn from(format: InputFormat) -> Self {
        match format {
            InputFormat::Json => comfort_insights::InputFormat::Json,
            InputFormat::Ndjson => comfort_insights::InputFormat::Ndjson,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
    /// Newline-delimited JSON (one row per line)
    Ndjson,
}

impl From<OutputFormat> for comfort_insights::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => comfort_insights::OutputFormat::Json,
            OutputFormat::JsonPretty => comfort_insights::OutputFormat::JsonPretty,
            OutputFormat::Ndjson => comfort_insights::OutputFormat::Ndjson,
        }
    }
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout carries only table output
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("comfort_insights=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), ComfortCliError> {
    match cli.command {
        Commands::Run {
            respondents,
            comfort_foods,
            output,
            out_dir,
            table,
            config,
            parallel,
            input_format,
            output_format,
            no_provenance,
        } => {
            let mut config = match config {
                Some(path) => PipelineConfig::load_from_file(path)?,
                None => PipelineConfig::default(),
            };
            config.parallel |= parallel;
            config.include_provenance &= !no_provenance;
            if let Some(format) = input_format {
                config.input_format = format.into();
            }
            if let Some(format) = output_format {
                config.output_format = format.into();
            }

            cmd_run(
                &respondents,
                &comfort_foods,
                &output,
                out_dir.as_deref(),
                table,
                &config,
            )
        }

        Commands::Validate {
            respondents,
            comfort_foods,
            input_format,
            json,
        } => cmd_validate(
            &respondents,
            comfort_foods.as_deref(),
            input_format.into(),
            json,
        ),

        Commands::Schema { stage, json } => cmd_schema(stage, json),
    }
}

fn cmd_run(
    respondents: &Path,
    comfort_foods: &Path,
    output: &Path,
    out_dir: Option<&Path>,
    table: Option<Stage>,
    config: &PipelineConfig,
) -> Result<(), ComfortCliError> {
    let respondents_data = read_input(respondents)?;
    let comfort_data = read_input(comfort_foods)?;

    let snapshot = InsightsPipeline::from_config(config).run_from_str(
        &respondents_data,
        &comfort_data,
        config.input_format,
    )?;
    let encoder = SnapshotEncoder::from_config(config);

    if let Some(dir) = out_dir {
        let written = encoder.write_table_files(&snapshot, dir)?;
        info!(files = written.len(), dir = %dir.display(), "wrote stage tables");
        return Ok(());
    }

    let rendered = match table {
        Some(stage) => encoder.encode_table(&snapshot, stage)?,
        None => encoder.encode_snapshot(&snapshot)?,
    };
    write_output(output, &rendered)
}

fn cmd_validate(
    respondents: &Path,
    comfort_foods: Option<&Path>,
    input_format: comfort_insights::InputFormat,
    json: bool,
) -> Result<(), ComfortCliError> {
    let respondents_data = read_input(respondents)?;
    let rows = DatasetAdapter::parse_rows(&respondents_data, input_format)?;
    let mut reports = vec![DatasetAdapter::validate::<RespondentRecord>(
        &RESPONDENT_SCHEMA,
        &rows,
    )];

    if let Some(path) = comfort_foods {
        let rows = DatasetAdapter::parse_rows(&read_input(path)?, input_format)?;
        reports.push(DatasetAdapter::validate::<ComfortFoodEntry>(
            &COMFORT_FOOD_SCHEMA,
            &rows,
        ));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            print_report(report);
        }
    }

    let problems: usize = reports
        .iter()
        .map(|r| r.missing_columns.len() + r.errors.len())
        .sum();
    if problems > 0 {
        return Err(ComfortCliError::ValidationFailed(problems));
    }

    // Row-level checks passed; this also rejects duplicate ids
    DatasetAdapter::parse_respondents(&respondents_data, input_format)?;
    Ok(())
}

fn print_report(report: &ValidationReport) {
    println!("Validation Report: {}", report.dataset);
    println!("==================={}", "=".repeat(report.dataset.len()));
    println!("Total rows:   {}", report.total_rows);
    println!("Valid rows:   {}", report.valid_rows);
    println!("Invalid rows: {}", report.errors.len());

    if !report.missing_columns.is_empty() {
        println!("\nMissing columns: {}", report.missing_columns.join(", "));
    }
    if !report.errors.is_empty() {
        println!("\nErrors:");
        for err in &report.errors {
            let id = err
                .id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            println!("  - Row {} (id {}): {}", err.index + 1, id, err.error);
        }
    }
    println!();
}

#[derive(serde::Serialize)]
struct StageInfo {
    stage: Stage,
    depends_on: &'static [Stage],
    reads_comfort_foods: bool,
    columns: &'static [&'static str],
}

fn cmd_schema(stage: Option<Stage>, json: bool) -> Result<(), ComfortCliError> {
    let stages: Vec<Stage> = match stage {
        Some(stage) => vec![stage],
        None => Stage::ALL.to_vec(),
    };
    let infos: Vec<StageInfo> = stages
        .into_iter()
        .map(|stage| StageInfo {
            stage,
            depends_on: stage.dependencies(),
            reads_comfort_foods: stage.reads_comfort_foods(),
            columns: stage.columns(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&infos)?);
        return Ok(());
    }

    println!("{} {} stages", PRODUCER_NAME, VERSION);
    for info in &infos {
        let mut inputs: Vec<String> = info.depends_on.iter().map(Stage::to_string).collect();
        if info.depends_on.is_empty() {
            inputs.push("respondents".to_string());
        }
        if info.reads_comfort_foods {
            inputs.push("comfort_foods".to_string());
        }
        println!("\n{} <- {}", info.stage, inputs.join(", "));
        for column in info.columns {
            println!("  {column}");
        }
    }
    Ok(())
}

fn read_input(path: &Path) -> Result<String, ComfortCliError> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn write_output(path: &Path, contents: &str) -> Result<(), ComfortCliError> {
    if path.to_string_lossy() == "-" {
        let mut stdout = io::stdout().lock();
        stdout.write_all(contents.as_bytes())?;
        if !contents.ends_with('\n') {
            writeln!(stdout)?;
        }
        stdout.flush()?;
    } else {
        fs::write(path, contents)?;
    }
    Ok(())
}

// Error handling

enum ComfortCliError {
    Io(io::Error),
    Pipeline(PipelineError),
    Json(serde_json::Error),
    ValidationFailed(usize),
}

impl From<io::Error> for ComfortCliError {
    fn from(e: io::Error) -> Self {
        ComfortCliError::Io(e)
    }
}

impl From<PipelineError> for ComfortCliError {
    fn from(e: PipelineError) -> Self {
        ComfortCliError::Pipeline(e)
    }
}

impl From<serde_json::Error> for ComfortCliError {
    fn from(e: serde_json::Error) -> Self {
        ComfortCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<ComfortCliError> for CliError {
    fn from(e: ComfortCliError) -> Self {
        match e {
            ComfortCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            ComfortCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            ComfortCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} validation problems found", count),
                hint: Some("Fix the reported rows and columns and retry".to_string()),
            },
            ComfortCliError::Pipeline(e) => {
                let (code, hint) = match &e {
                    PipelineError::MissingColumn { .. } => (
                        "MISSING_COLUMN",
                        Some("Run 'comfort schema' to list required columns"),
                    ),
                    PipelineError::ParseError(_) | PipelineError::JsonError(_) => (
                        "PARSE_ERROR",
                        Some("Check --input-format and JSON syntax"),
                    ),
                    PipelineError::InvalidValue(_) => (
                        "INVALID_VALUE",
                        Some("Run 'comfort validate' for details"),
                    ),
                    PipelineError::ConfigError(_) | PipelineError::TomlError(_) => {
                        ("CONFIG_ERROR", Some("Check the configuration file"))
                    }
                    PipelineError::Io(_) | PipelineError::EncodingError(_) => (
                        "IO_ERROR",
                        Some("Check file paths and permissions"),
                    ),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: hint.map(str::to_string),
                }
            }
        }
    }
}
