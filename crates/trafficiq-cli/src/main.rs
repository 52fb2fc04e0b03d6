//! TrafficIQ command-line interface
//!
//! The `trafficiq` command drives the vehicle identification pipeline locally.
//!
//! ## Commands
//!
//! - `analyze`: Predict vehicle attributes for one image
//! - `run`: Run the full pipeline and open a case
//! - `case`: Look up or list cases
//! - `eval`: Score the predictor against a labelled dataset

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};

use trafficiq_core::{
    predictor_from_settings, AgentResult, AgentRunRequest, CaseRecord, CaseRecorder, Evaluator,
    Settings, TrafficAgent, VehiclePrediction, DEFAULT_LIST_LIMIT, METRICS,
};

#[derive(Parser)]
#[command(name = "trafficiq")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "TrafficIQ vehicle identification pipeline", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output and JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Artifacts directory (case log, evidence, reports)
    #[arg(long, global = true, env = "ARTIFACTS_PATH")]
    artifacts_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict vehicle attributes for an image
    Analyze {
        /// Image URI or path
        image_uri: String,
    },

    /// Run the full pipeline: predict, OCR fallback, watchlist, evidence, case
    Run {
        /// Image URI or path
        image_uri: String,

        /// Where the image was captured
        #[arg(short, long)]
        location: Option<String>,

        /// Capture time (RFC 3339); defaults to now
        #[arg(short, long, value_parser = parse_timestamp)]
        timestamp: Option<DateTime<Utc>>,
    },

    /// Inspect cases
    Case {
        #[command(subcommand)]
        action: CaseAction,
    },

    /// Evaluate the predictor against a JSONL dataset
    Eval {
        /// Labelled dataset
        #[arg(short, long, default_value = "eval/sample_data.jsonl")]
        dataset: PathBuf,

        /// Report path (default: <artifacts>/eval_report.md)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum CaseAction {
    /// Show one case
    Get {
        /// Case identifier (CASE-xxxxxxxx)
        case_id: String,
    },
    /// List the most recent cases, oldest first
    List {
        /// Maximum number of cases
        #[arg(short, long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: usize,
    },
}

fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 timestamp '{raw}': {e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    trafficiq_core::init_tracing(cli.json, level);

    let mut settings = Settings::from_env();
    if let Some(dir) = &cli.artifacts_dir {
        settings = settings.with_artifacts_path(dir);
    }

    match cli.command {
        Commands::Analyze { image_uri } => cmd_analyze(&settings, &image_uri, cli.json).await,
        Commands::Run {
            image_uri,
            location,
            timestamp,
        } => {
            let mut request = AgentRunRequest::new(image_uri);
            request.location = location;
            request.timestamp = timestamp;
            cmd_run(&settings, request, cli.json).await
        }
        Commands::Case { action } => match action {
            CaseAction::Get { case_id } => cmd_case_get(&settings, &case_id, cli.json).await,
            CaseAction::List { limit } => cmd_case_list(&settings, limit, cli.json).await,
        },
        Commands::Eval { dataset, output } => {
            cmd_eval(&settings, &dataset, output.as_deref(), cli.json).await
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

fn print_prediction(p: &VehiclePrediction) {
    println!("Image:      {}", p.image_uri);
    println!("Vehicle:    {} {} ({})", p.make, p.model, p.year_range);
    println!("Appearance: {} {}", p.color, p.body_type);
    println!("Confidence: {:.2}", p.confidence);
    println!("Condition:  {}", p.image_condition);
}

fn print_case(case: &CaseRecord) {
    println!("case {}", case.case_id);
    println!("Priority: {}", case.priority);
    println!("Status:   {}", case.status);
    println!("Created:  {}", case.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    if let Some(plate) = &case.plate_number {
        println!("Plate:    {plate}");
    }
    if let Some(location) = &case.location {
        println!("Location: {location}");
    }
    println!("Evidence: {}", case.evidence_path);
    println!();
    println!("    {}", case.summary);
}

/// Predict vehicle attributes
async fn cmd_analyze(settings: &Settings, image_uri: &str, json: bool) -> Result<()> {
    let predictor =
        predictor_from_settings(settings).context("Failed to configure vehicle predictor")?;
    let prediction = predictor
        .predict_vehicle(image_uri)
        .await
        .with_context(|| format!("Prediction failed for {image_uri}"))?;

    if json {
        print_json(&prediction)
    } else {
        print_prediction(&prediction);
        Ok(())
    }
}

/// Run the full pipeline
async fn cmd_run(settings: &Settings, request: AgentRunRequest, json: bool) -> Result<()> {
    let agent = TrafficAgent::from_settings(settings).context("Failed to initialize agent")?;
    let result: AgentResult = agent
        .run(request)
        .await
        .map_err(|e| {
            tracing::error!(stage = %e.stage, steps = ?e.steps, "pipeline aborted");
            e
        })
        .context("Agent run failed")?;
    METRICS.flush();

    if json {
        return print_json(&result);
    }

    print_prediction(&result.vehicle_prediction);
    if let Some(plate) = &result.plate_result {
        println!("Plate:      {} ({:.2})", plate.plate_number, plate.confidence);
    }
    if let Some(bolo) = &result.bolo_match {
        println!("Watchlist:  match={} ({})", bolo.is_match, bolo.reason);
    }
    println!("Priority:   {}", result.priority);
    println!("Steps:      {}", result.processing_steps.join(" -> "));
    println!("Elapsed:    {:.2} ms", result.total_processing_time_ms);
    if let Some(case) = &result.case_record {
        println!();
        print_case(case);
    }
    Ok(())
}

/// Show one case
async fn cmd_case_get(settings: &Settings, case_id: &str, json: bool) -> Result<()> {
    let recorder = CaseRecorder::from_settings(settings).context("Failed to open case log")?;
    let case = recorder
        .get_case(case_id)
        .await
        .context("Failed to read case log")?;

    match case {
        Some(case) if json => print_json(&case),
        Some(case) => {
            print_case(&case);
            Ok(())
        }
        None => anyhow::bail!("Case not found: {case_id}"),
    }
}

/// List recent cases
async fn cmd_case_list(settings: &Settings, limit: usize, json: bool) -> Result<()> {
    let recorder = CaseRecorder::from_settings(settings).context("Failed to open case log")?;
    let cases = recorder
        .list_cases(limit)
        .await
        .context("Failed to list cases")?;

    if json {
        return print_json(&cases);
    }
    if cases.is_empty() {
        println!("No cases found");
        return Ok(());
    }
    for case in &cases {
        println!(
            "{}  {}  {}  {} {} ({})",
            case.case_id,
            case.priority,
            case.created_at.format("%Y-%m-%d %H:%M:%S"),
            case.vehicle_make,
            case.vehicle_model,
            case.vehicle_year_range
        );
    }
    Ok(())
}

/// Score the predictor
async fn cmd_eval(
    settings: &Settings,
    dataset: &Path,
    output: Option<&Path>,
    json: bool,
) -> Result<()> {
    let evaluator = Evaluator::from_settings(settings).context("Failed to configure evaluator")?;
    let outcome = evaluator
        .run(dataset, output)
        .await
        .with_context(|| format!("Evaluation failed for {}", dataset.display()))?;

    if json {
        return print_json(&outcome.metrics);
    }

    let m = &outcome.metrics;
    println!("Samples:            {}", outcome.samples);
    println!("Predictions:        {}", outcome.predictions.len());
    println!("Accuracy:           {:.4}", m.accuracy);
    println!("Precision (macro):  {:.4}", m.precision_macro);
    println!("Recall (macro):     {:.4}", m.recall_macro);
    println!("F1 (macro):         {:.4}", m.f1_macro);
    println!("ECE:                {:.4}", m.ece_confidence);
    match &outcome.report_path {
        Some(path) => info!(path = %path.display(), "report written"),
        None => println!("No samples evaluated; no report written"),
    }
    Ok(())
}
