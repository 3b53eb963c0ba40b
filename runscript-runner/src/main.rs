//! runscript
//!
//! Launches a predefined script through the GitLab run-script pipeline by
//! driving the web UI, then follows the pipeline through its manual gates.
//!
//! Architecture:
//! - Session: browser access over the Chrome DevTools Protocol
//! - Form: ref selection and the CI variable form
//! - Monitor: the request -> approve -> run -> completion state machine
//! - Orchestrator: input validation, session lifecycle, failure snapshot

mod config;
mod context;
mod error;
mod form;
mod monitor;
mod orchestrator;
mod script;
mod selectors;
mod session;

use anyhow::{Context, Result};
use clap::Parser;
use clap::error::ErrorKind;
use colored::*;
use runscript_core::domain::log::{LogLevel, TraceEntry};
use runscript_core::domain::stage::MonitorState;
use serde::Serialize;
use std::path::Path;
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::orchestrator::{RunOrchestrator, RunReport, RunRequest};
use crate::session::{AttachTransport, LaunchTransport, Transport};

#[derive(Parser)]
#[command(name = "runscript")]
#[command(about = "Run a script through the GitLab run-script pipeline", long_about = None)]
struct Args {
    /// Ticket description (e.g., ES-1234)
    #[arg(short, long)]
    ticket: String,

    /// Script name, read from <scripts-dir>/<name>.rb
    #[arg(short, long)]
    script: String,

    /// Ejar service the script runs against
    #[arg(short = 'e', long = "ejar-service")]
    ejar_service: String,

    /// Branch: development, production, test or uat (case-insensitive)
    #[arg(short, long, default_value = "production")]
    branch: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "runscript_runner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
    };

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{} {:#}", "✗".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<bool> {
    let config = load_config()?;

    println!("{}", "▶ GitLab run-script pipeline".cyan().bold());
    println!("  Ticket:  {}", args.ticket.bold());
    println!("  Script:  {}", args.script.bold());
    println!("  Service: {}", args.ejar_service.bold());
    println!("  Branch:  {}", args.branch.bold());
    println!("  Project: {}", config.project_url().dimmed());
    println!();

    let transports: Vec<Box<dyn Transport>> = vec![
        Box::new(AttachTransport::new(config.cdp_url.clone())),
        Box::new(LaunchTransport::new(config.headless)),
    ];
    let orchestrator = RunOrchestrator::new(config.clone(), transports);

    let request = RunRequest {
        ticket: args.ticket,
        script: args.script,
        service: args.ejar_service,
        branch: args.branch,
    };

    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for interrupts: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let report = orchestrator.run(request, interrupt).await;
    print_summary(&report);

    if let Some(path) = &config.trace_file {
        match write_trace(path, &report) {
            Ok(()) => info!("Run trace written to {}", path.display()),
            Err(e) => warn!("{:#}", e),
        }
    }

    Ok(report.is_success())
}

/// Loads configuration from environment variables
///
/// A malformed variable stops the run instead of silently using defaults.
fn load_config() -> Result<Config> {
    let config = Config::from_env().context("Invalid environment configuration")?;
    config.validate()?;
    Ok(config)
}

fn print_summary(report: &RunReport) {
    println!();
    match &report.outcome {
        Ok(()) => {
            println!("{}", "✓ Pipeline run completed".green().bold());
            match report.pipeline_id() {
                Some(id) => println!("  Pipeline ID: {}", id.to_string().cyan()),
                None => println!("  Pipeline ID: {}", "unknown".yellow()),
            }
            print_entries(report, |entry| entry.level == LogLevel::Warning);
        }
        Err(e) => {
            println!("{} {}", "✗ Pipeline run failed:".red().bold(), e);
            if let Some(state) = report.final_state {
                println!("  Final state: {}", state.to_string().red());
            }
            print_entries(report, |_| true);
        }
    }
    println!("  Run ID: {}", report.run_id.to_string().dimmed());
}

fn print_entries(report: &RunReport, keep: impl Fn(&TraceEntry) -> bool) {
    let entries: Vec<&TraceEntry> = report.trace.iter().filter(|&entry| keep(entry)).collect();
    if entries.is_empty() {
        return;
    }

    println!("  Trace:");
    for entry in entries {
        let level = match entry.level {
            LogLevel::Error => entry.level.to_string().red(),
            LogLevel::Warning => entry.level.to_string().yellow(),
            _ => entry.level.to_string().dimmed(),
        };
        println!(
            "    {} {:>5} {}",
            entry.timestamp.format("%H:%M:%S").to_string().dimmed(),
            level,
            entry.event
        );
    }
}

#[derive(Serialize)]
struct TraceDump<'a> {
    run_id: String,
    success: bool,
    error: Option<String>,
    pipeline_id: Option<u64>,
    final_state: Option<MonitorState>,
    trace: &'a [TraceEntry],
}

fn write_trace(path: &Path, report: &RunReport) -> Result<()> {
    let dump = TraceDump {
        run_id: report.run_id.to_string(),
        success: report.is_success(),
        error: report.outcome.as_ref().err().map(|e| e.to_string()),
        pipeline_id: report.pipeline_id(),
        final_state: report.final_state,
        trace: &report.trace,
    };

    let json = serde_json::to_string_pretty(&dump).context("Failed to serialize run trace")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write run trace to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_branch_help_mentions_case() {
        let command = Args::command();
        let branch = command
            .get_arguments()
            .find(|arg| arg.get_id() == "branch")
            .unwrap();
        let help = branch.get_help().unwrap().to_string();
        assert!(help.contains("case-insensitive"));
    }

    #[test]
    fn test_branch_defaults_to_production() {
        let args = Args::try_parse_from(["runscript", "-t", "ES-1", "-s", "noop", "-e", "web"]);
        assert_eq!(args.unwrap().branch, "production");
    }
}
