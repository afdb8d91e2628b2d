//! Faultline CLI
//!
//! Compiles chaos scenarios and runs them against a fault injection backend.

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod render;
mod signal;
mod wiring;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use application::{CompileError, RunStatus, SyntaxError, check, compile, print_program, render_dot};
use clap::{Parser, Subcommand};
use infrastructure::{AppConfig, BackendKind, MetricsProvider, init_logging};
use tracing::{error, info};

/// Process exit codes
mod exit {
    pub const SUCCESS: u8 = 0;
    pub const PARTIAL_FAILURE: u8 = 3;
    pub const FAILURE: u8 = 4;
    pub const INTERNAL: u8 = 5;
}

/// Faultline chaos scenario runner
#[derive(Parser)]
#[command(name = "faultline")]
#[command(author, version, about = "Declarative chaos scenarios for containers and pods", long_about = None)]
struct Cli {
    /// Verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (defaults to ./faultline.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a scenario file
    ///
    /// Example: faultline run outage.chaos --target docker --prom-url http://prom:9090
    Run {
        /// Scenario file
        file: PathBuf,

        /// Fault injection backend (docker, kubernetes, dry-run)
        #[arg(short, long)]
        target: Option<BackendKind>,

        /// Log faults instead of applying them; same as --target dry-run
        #[arg(long)]
        dry_run: bool,

        /// Prometheus base URL for conditions
        #[arg(long)]
        prom_url: Option<String>,

        /// Fixed metric value, NAME=VALUE; switches conditions to these values
        #[arg(long = "metric", value_parser = parse_metric)]
        metrics: Vec<(String, f64)>,

        /// Per-call timeout for backend and metric calls
        #[arg(long)]
        call_timeout_ms: Option<u64>,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Lex, parse and validate a scenario file
    Check {
        file: PathBuf,
    },

    /// Print the execution plan
    Plan {
        file: PathBuf,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the canonical form of a scenario file
    Fmt {
        file: PathBuf,
    },

    /// Render a scenario file as a Graphviz digraph
    Visualize {
        file: PathBuf,

        /// Write DOT to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Determine log filter override from verbosity count
const fn log_filter_from_verbosity(verbose: u8) -> Option<&'static str> {
    match verbose {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    }
}

fn parse_metric(raw: &str) -> Result<(String, f64), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{raw}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing metric name in `{raw}`"));
    }
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid value for `{name}`: {e}"))?;
    Ok((name.to_string(), value))
}

/// `file:line:column: message` for pre-execution errors
fn diagnostics(file: &Path, err: &CompileError) -> Vec<String> {
    let file = file.display();
    match err {
        CompileError::Syntax(SyntaxError::Lex(e)) => vec![format!("{file}:{e}")],
        CompileError::Syntax(SyntaxError::Parse(e)) => vec![format!("{file}:{e}")],
        CompileError::Validation(errors) => errors
            .errors()
            .iter()
            .map(|e| format!("{file}: {e}"))
            .collect(),
    }
}

const fn status_exit_code(status: RunStatus, cancelled: bool) -> u8 {
    match status {
        RunStatus::Success if cancelled => exit::PARTIAL_FAILURE,
        RunStatus::Success => exit::SUCCESS,
        RunStatus::PartialFailure => exit::PARTIAL_FAILURE,
        RunStatus::Failure => exit::FAILURE,
    }
}

fn read_source(file: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(file)
        .map_err(|e| anyhow::anyhow!("{}: cannot read file: {e}", file.display()))
}

/// Report compile errors and turn them into an exit code
fn compile_failed(file: &Path, err: &CompileError) -> ExitCode {
    for line in diagnostics(file, err) {
        eprintln!("{line}");
    }
    ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(exit::INTERNAL))
}

async fn execute(cli: Cli, mut config: AppConfig) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Run {
            file,
            target,
            dry_run,
            prom_url,
            metrics,
            call_timeout_ms,
            json,
        } => {
            let source = read_source(&file)?;
            let plan = match compile(&source) {
                Ok(plan) => plan,
                Err(err) => return Ok(compile_failed(&file, &err)),
            };

            if let Some(target) = target {
                config.target = target;
            }
            if dry_run {
                config.target = BackendKind::DryRun;
            }
            if let Some(url) = prom_url {
                config.metrics.provider = MetricsProvider::Prometheus;
                config.metrics.prometheus.base_url = url;
            }
            if !metrics.is_empty() {
                config.metrics.provider = MetricsProvider::Static;
                config.metrics.values.extend(metrics);
            }
            if let Some(ms) = call_timeout_ms {
                config.executor.call_timeout_ms = ms;
            }

            let executor = wiring::executor(&config)?;
            if let Err(e) = executor.preflight().await {
                eprintln!("error: {e}");
                return Ok(ExitCode::from(exit::INTERNAL));
            }

            info!(file = %file.display(), runs = plan.runs.len(), "Starting execution");
            let cancel = signal::cancel_on_interrupt();
            let report = executor.run_plan(&plan, cancel).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", render::report(&report));
            }
            Ok(ExitCode::from(status_exit_code(report.status, report.cancelled)))
        },

        Commands::Check { file } => {
            let source = read_source(&file)?;
            match check(&source) {
                Ok(program) => {
                    println!("{}: ok ({} statement(s))", file.display(), program.statements.len());
                    Ok(ExitCode::SUCCESS)
                },
                Err(err) => Ok(compile_failed(&file, &err)),
            }
        },

        Commands::Plan { file, json } => {
            let source = read_source(&file)?;
            let plan = match compile(&source) {
                Ok(plan) => plan,
                Err(err) => return Ok(compile_failed(&file, &err)),
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                print!("{}", render::plan(&plan));
            }
            Ok(ExitCode::SUCCESS)
        },

        Commands::Fmt { file } => {
            let source = read_source(&file)?;
            match check(&source) {
                Ok(program) => {
                    print!("{}", print_program(&program));
                    Ok(ExitCode::SUCCESS)
                },
                Err(err) => Ok(compile_failed(&file, &err)),
            }
        },

        Commands::Visualize { file, output } => {
            let source = read_source(&file)?;
            let program = match check(&source) {
                Ok(program) => program,
                Err(err) => return Ok(compile_failed(&file, &err)),
            };
            let dot = render_dot(&program);
            match output {
                Some(path) => {
                    std::fs::write(&path, dot)?;
                    info!(path = %path.display(), "DOT written");
                },
                None => print!("{dot}"),
            }
            Ok(ExitCode::SUCCESS)
        },
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: configuration: {e}");
            return ExitCode::from(exit::INTERNAL);
        },
    };

    if let Some(filter) = log_filter_from_verbosity(cli.verbose) {
        config.logging = config.logging.with_filter(filter);
    }
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("error: {e}");
        return ExitCode::from(exit::INTERNAL);
    }

    match execute(cli, config).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("error: {e:#}");
            ExitCode::from(exit::INTERNAL)
        },
    }
}
