//! W-HEART CLI - Command-line interface for the W-HEART engine
//!
//! Commands:
//! - evaluate: Score JSON input records
//! - validate: Score a CSV dataset and report AUC / sensitivity / specificity
//! - scenarios: Run the reference profiles
//! - mapping: Print the default column map

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use w_heart::dataset::{Dataset, DEFAULT_RISK_COLUMN};
use w_heart::scenarios::reference_scenarios;
use w_heart::{evaluate, evaluate_batch, ColumnMap, DatasetValidator, RiskInput, RiskOutput};
use w_heart::{CRATE_VERSION, FORMULA_VERSION};

/// W-HEART - deterministic cardiovascular load and risk engine
#[derive(Parser)]
#[command(name = "wheart")]
#[command(version = CRATE_VERSION)]
#[command(about = "Closed-form cardiovascular risk scoring", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score JSON input records (one object or an array)
    Evaluate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Reject inputs with out-of-range fields
        #[arg(long)]
        strict: bool,
    },

    /// Score a CSV dataset against its label column
    Validate {
        /// Input CSV path
        #[arg(short, long)]
        input: PathBuf,

        /// Column map JSON (defaults to the CAIR-CVD layout)
        #[arg(long)]
        mapping: Option<PathBuf>,

        /// Write the dataset with a risk column appended
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Name of the appended risk column
        #[arg(long, default_value = DEFAULT_RISK_COLUMN)]
        column: String,

        /// Decision threshold for sensitivity/specificity
        #[arg(long, default_value = "0.5")]
        threshold: f64,

        /// Output report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the reference scenarios
    Scenarios {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default column map as JSON
    Mapping,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one result per line)
    Ndjson,
    /// JSON array of results
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), WheartCliError> {
    match cli.command {
        Commands::Evaluate {
            input,
            output_format,
            strict,
        } => cmd_evaluate(&input, output_format, strict),

        Commands::Validate {
            input,
            mapping,
            output,
            column,
            threshold,
            json,
        } => cmd_validate(&input, mapping.as_deref(), output.as_deref(), &column, threshold, json),

        Commands::Scenarios { json } => cmd_scenarios(json),

        Commands::Mapping => {
            println!("{}", ColumnMap::default().to_json()?);
            Ok(())
        }
    }
}

fn read_input(input: &Path) -> Result<String, WheartCliError> {
    if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            eprintln!("Reading input from terminal; end with Ctrl-D");
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

/// Accept either a single object or an array of objects
fn parse_inputs(data: &str) -> Result<Vec<RiskInput>, WheartCliError> {
    let value: serde_json::Value = serde_json::from_str(data)?;
    let inputs = if value.is_array() {
        serde_json::from_value(value)?
    } else {
        vec![serde_json::from_value(value)?]
    };
    Ok(inputs)
}

fn cmd_evaluate(input: &Path, output_format: OutputFormat, strict: bool) -> Result<(), WheartCliError> {
    let inputs = parse_inputs(&read_input(input)?)?;

    if inputs.is_empty() {
        return Err(WheartCliError::NoInputs);
    }

    for (index, record) in inputs.iter().enumerate() {
        if let Err(errors) = record.validate() {
            if strict {
                return Err(WheartCliError::InvalidInput { index, errors });
            }
            tracing::warn!(index, problems = %errors.join("; "), "input out of range");
        }
    }

    let outputs = evaluate_batch(&inputs);
    print!("{}", format_output(&outputs, &output_format)?);
    Ok(())
}

fn cmd_validate(
    input: &Path,
    mapping: Option<&Path>,
    output: Option<&Path>,
    column: &str,
    threshold: f64,
    json: bool,
) -> Result<(), WheartCliError> {
    let column_map = match mapping {
        Some(path) => ColumnMap::from_json(&fs::read_to_string(path)?)?,
        None => ColumnMap::default(),
    };

    let dataset = Dataset::from_path(input)?;
    let run = DatasetValidator::new(column_map)
        .with_threshold(threshold)
        .run(&dataset)?;

    if let Some(path) = output {
        dataset.write_with_column(path, column, &run.risk_column())?;
    }

    let report = &run.report;
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("W-HEART {} validation", FORMULA_VERSION);
    println!("========================");
    println!("Rows:     {}", report.rows_total);
    println!("Scored:   {}", report.rows_scored);
    println!("Skipped:  {}", report.rows_skipped);
    println!("Labeled:  {}", report.rows_labeled);
    println!("Warnings: {}", report.warnings_count);

    if let Some(summary) = &report.summary {
        println!("\nRisk summary:");
        println!("  mean {:.6}  std {:.6}", summary.mean, summary.std);
        println!(
            "  min {:.6}  25% {:.6}  50% {:.6}  75% {:.6}  max {:.6}",
            summary.min, summary.p25, summary.median, summary.p75, summary.max
        );
    }

    println!("\nPhases:");
    for (phase, count) in &report.phase_counts {
        println!("  {:<40} {}", phase, count);
    }

    match report.auc {
        Some(auc) => println!("\nAUC: {:.4}", auc),
        None => println!("\nNo usable labels, AUC not computed."),
    }
    if let Some(confusion) = &report.confusion {
        println!(
            "At threshold {}: TP {}  FP {}  TN {}  FN {}",
            report.threshold,
            confusion.true_positive,
            confusion.false_positive,
            confusion.true_negative,
            confusion.false_negative
        );
        println!(
            "Sensitivity: {}  Specificity: {}",
            fmt_rate(report.sensitivity),
            fmt_rate(report.specificity)
        );
    }
    if let Some(path) = output {
        println!("\nSaved: {}", path.display());
    }

    Ok(())
}

fn cmd_scenarios(json: bool) -> Result<(), WheartCliError> {
    let scenarios = reference_scenarios();

    if json {
        let results: Vec<serde_json::Value> = scenarios
            .iter()
            .map(|s| serde_json::json!({ "name": s.name, "input": s.input, "output": evaluate(&s.input) }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    println!("W-HEART {} reference scenarios\n", FORMULA_VERSION);
    for scenario in &scenarios {
        let output = evaluate(&scenario.input);
        println!("{}:", scenario.name);
        println!("  risk:  {}", output.risk);
        println!("  phase: {}", output.phase);
        println!("  N_vasc: {} / {}", output.n_vasc, output.n_crit);
        println!("---------------------------------------------");
    }
    Ok(())
}

// Helper functions

fn format_output(outputs: &[RiskOutput], format: &OutputFormat) -> Result<String, WheartCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for output in outputs {
                lines.push(serde_json::to_string(output)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(outputs)? + "\n"),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(outputs)? + "\n"),
    }
}

fn fmt_rate(rate: Option<f64>) -> String {
    rate.map(|r| format!("{:.4}", r)).unwrap_or_else(|| "n/a".to_string())
}

// Error types

#[derive(Debug)]
enum WheartCliError {
    Io(io::Error),
    Compute(w_heart::ComputeError),
    Json(serde_json::Error),
    NoInputs,
    InvalidInput { index: usize, errors: Vec<String> },
}

impl From<io::Error> for WheartCliError {
    fn from(e: io::Error) -> Self {
        WheartCliError::Io(e)
    }
}

impl From<w_heart::ComputeError> for WheartCliError {
    fn from(e: w_heart::ComputeError) -> Self {
        WheartCliError::Compute(e)
    }
}

impl From<serde_json::Error> for WheartCliError {
    fn from(e: serde_json::Error) -> Self {
        WheartCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<WheartCliError> for CliError {
    fn from(e: WheartCliError) -> Self {
        match e {
            WheartCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            WheartCliError::Compute(e) => CliError {
                code: "COMPUTE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'wheart mapping' to compare the column map with the dataset header".to_string()),
            },
            WheartCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            WheartCliError::NoInputs => CliError {
                code: "NO_INPUTS".to_string(),
                message: "No input records found".to_string(),
                hint: Some("Ensure the input array is not empty".to_string()),
            },
            WheartCliError::InvalidInput { index, errors } => CliError {
                code: "INVALID_INPUT".to_string(),
                message: format!("Input {} failed validation: {}", index, errors.join("; ")),
                hint: Some("Fix the listed fields or drop --strict".to_string()),
            },
        }
    }
}
