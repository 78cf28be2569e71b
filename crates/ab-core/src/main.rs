//! ab-core - Bayesian A/B inference
//!
//! The main entry point for ab-core, handling:
//! - Routing data to a model configuration
//! - Fitting routed or explicitly requested models
//! - Comparing candidate models with WAIC or BIC

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ab_common::error::format_error_human;
use ab_common::{Error, ModelConfig, OutputFormat, Result, StandardData};
use ab_core::config::{load_fit_options, FitOptions};
use ab_core::events::{FanoutEmitter, JsonlWriter, ProgressEmitter, RunEmitter};
use ab_core::exit_codes::ExitCode;
use ab_core::inference::FitReport;
use ab_core::logging::{event_names, generate_run_id, init_logging, LogConfig, LogFormat, LogLevel};
use ab_core::router::{ModelRouter, RouteDecision};
use ab_core::selection::{compare_configs, Criterion, ModelComparison};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

/// Bayesian inference for A/B test data
#[derive(Parser)]
#[command(name = "ab-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format on stderr (human, jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the routing decision for a data file
    Route(RouteArgs),

    /// Fit a model and print its posterior summary
    Fit(FitArgs),

    /// Fit several models and rank them
    Compare(CompareArgs),
}

#[derive(Args, Debug)]
struct RouteArgs {
    /// Data file (JSON `StandardData`)
    #[arg(long)]
    data: PathBuf,
}

#[derive(Args, Debug)]
struct FitArgs {
    /// Data file (JSON `StandardData`)
    #[arg(long)]
    data: PathBuf,

    /// Model as structure:family[:components], e.g. simple:lognormal:2; routed when absent
    #[arg(long)]
    model: Option<ModelConfig>,

    /// Fit options file (.json or .toml)
    #[arg(long)]
    options: Option<PathBuf>,

    /// RNG seed; overrides the options file
    #[arg(long)]
    seed: Option<u64>,

    #[command(flatten)]
    progress: ProgressArgs,
}

#[derive(Args, Debug)]
struct ProgressArgs {
    /// Stream progress events as JSONL on stderr
    #[arg(long)]
    progress: bool,

    /// Also write progress events as JSONL to this file
    #[arg(long)]
    progress_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct CompareArgs {
    /// Data file (JSON `StandardData`)
    #[arg(long)]
    data: PathBuf,

    /// Comma-separated models, e.g. simple:normal,simple:lognormal
    #[arg(long, required = true, value_delimiter = ',')]
    models: Vec<ModelConfig>,

    /// Information criterion
    #[arg(long, default_value = "waic")]
    criterion: Criterion,

    /// Fit options file (.json or .toml)
    #[arg(long)]
    options: Option<PathBuf>,

    /// RNG seed; overrides the options file
    #[arg(long)]
    seed: Option<u64>,

    #[command(flatten)]
    progress: ProgressArgs,
}

/// Payload of the `fit` command.
#[derive(Serialize)]
struct FitOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    route: Option<RouteDecision>,
    result: FitReport,
}

fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::from_env(cli.global.log_level, cli.global.log_format);
    init_logging(&log_config);

    let command = match &cli.command {
        Commands::Route(_) => "route",
        Commands::Fit(_) => "fit",
        Commands::Compare(_) => "compare",
    };
    tracing::debug!(target: event_names::RUN_STARTED, command, "run started");

    let outcome = match &cli.command {
        Commands::Route(args) => run_route(&cli.global, args),
        Commands::Fit(args) => run_fit(&cli.global, args),
        Commands::Compare(args) => run_compare(&cli.global, args),
    };

    let exit_code = match outcome {
        Ok(()) => ExitCode::Clean,
        Err(err) => {
            let code = ExitCode::for_error(&err);
            if code == ExitCode::InternalError {
                tracing::error!(target: event_names::INTERNAL_ERROR, error = %err, "internal error");
            }
            report_error(&cli.global, &err);
            code
        }
    };
    tracing::debug!(
        target: event_names::RUN_FINISHED,
        command,
        exit_code = exit_code.as_i32(),
        "run finished"
    );
    std::process::exit(exit_code.as_i32());
}

fn report_error(global: &GlobalOpts, err: &Error) {
    match global.format {
        OutputFormat::Json => println!("{}", err.to_response().to_json()),
        OutputFormat::Summary => {
            let use_color = !global.no_color && std::io::stderr().is_terminal();
            eprintln!("{}", format_error_human(err, use_color));
        }
    }
}

fn load_data(path: &Path) -> Result<StandardData> {
    let content = std::fs::read_to_string(path)?;
    let data: StandardData = serde_json::from_str(&content)?;
    data.validate()?;
    Ok(data)
}

fn load_options_file(path: Option<&Path>, seed: Option<u64>) -> Result<FitOptions> {
    let mut options = match path {
        Some(path) => load_fit_options(path)?.apply(FitOptions::default()),
        None => FitOptions::default(),
    };
    if seed.is_some() {
        options.seed = seed;
    }
    options.validate()?;
    Ok(options)
}

/// Progress sinks requested on the command line, stamped with one run id.
fn progress_emitter(args: &ProgressArgs) -> Result<Option<Arc<dyn ProgressEmitter>>> {
    let mut sinks: Vec<Arc<dyn ProgressEmitter>> = Vec::new();
    if args.progress {
        sinks.push(Arc::new(JsonlWriter::new(std::io::stderr())));
    }
    if let Some(path) = &args.progress_file {
        sinks.push(Arc::new(JsonlWriter::new(std::fs::File::create(path)?)));
    }
    if sinks.is_empty() {
        return Ok(None);
    }
    let fanout: Arc<dyn ProgressEmitter> = Arc::new(FanoutEmitter::new(sinks));
    Ok(Some(Arc::new(RunEmitter::new(generate_run_id(), fanout))))
}

fn load_options(path: Option<&Path>, seed: Option<u64>, progress: &ProgressArgs) -> Result<FitOptions> {
    let options = load_options_file(path, seed)?;
    Ok(match progress_emitter(progress)? {
        Some(emitter) => options.with_progress(emitter),
        None => options,
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.4}"))
}

fn run_route(global: &GlobalOpts, args: &RouteArgs) -> Result<()> {
    let data = load_data(&args.data)?;
    let decision = ModelRouter::new().route(&data)?;
    match global.format {
        OutputFormat::Json => print_json(&decision),
        OutputFormat::Summary => {
            println!(
                "{} via {} (confidence {:.2})",
                decision.config, decision.engine, decision.confidence
            );
            Ok(())
        }
    }
}

fn run_fit(global: &GlobalOpts, args: &FitArgs) -> Result<()> {
    let data = load_data(&args.data)?;
    let options = load_options(args.options.as_deref(), args.seed, &args.progress)?;

    let router = ModelRouter::new();
    let (route, result) = match &args.model {
        Some(config) => (None, router.fit_with_config(&data, config, &options)?),
        None => {
            let routed = router.fit(&data, &options)?;
            (Some(routed.decision), routed.result)
        }
    };

    let report = result.report();
    match global.format {
        OutputFormat::Json => print_json(&FitOutput {
            route,
            result: report,
        }),
        OutputFormat::Summary => {
            let (lo, hi) = report.posterior.credible_interval.unzip();
            println!(
                "{} [{}] mean {} 95% CI [{}, {}] converged={} iterations={}",
                report.metadata.config,
                report.diagnostics.model_type,
                fmt_opt(report.posterior.mean),
                fmt_opt(lo),
                fmt_opt(hi),
                report.diagnostics.converged,
                report.diagnostics.iterations
            );
            Ok(())
        }
    }
}

fn run_compare(global: &GlobalOpts, args: &CompareArgs) -> Result<()> {
    let data = load_data(&args.data)?;
    let options = load_options(args.options.as_deref(), args.seed, &args.progress)?;
    let comparison: ModelComparison = compare_configs(&args.models, &data, args.criterion, &options)?;
    match global.format {
        OutputFormat::Json => print_json(&comparison),
        OutputFormat::Summary => {
            for model in &comparison.ranked {
                println!(
                    "{:<24} {}={:.4} delta={:.4} weight={:.3}",
                    model.name, comparison.criterion, model.score, model.delta, model.weight
                );
            }
            for dropped in &comparison.dropped {
                println!("{:<24} dropped: {}", dropped.name, dropped.reason);
            }
            Ok(())
        }
    }
}
