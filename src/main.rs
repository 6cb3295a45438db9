use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use execstatus::config::{EngineConfig, LoggingConfig};
use execstatus::resolve::resolve_canonical;
use execstatus::{
    aggregate, CanonicalStatus, Execution, ExecutionKind, ParentRef, Status, StatusReport,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "execstatus",
    about = "Incremental status resolution for test executions",
    version,
    long_about = None
)]
struct Cli {
    /// Config file (defaults to $EXECSTATUS_CONFIG, then ./execstatus.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate a list of step statuses into an execution status
    Aggregate {
        /// Step statuses, in execution order
        #[arg(required = true)]
        statuses: Vec<Status>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Apply step status changes to a fresh execution, one at a time
    Replay {
        /// Number of steps in the execution
        #[arg(long)]
        steps: usize,

        /// Use the automated legal status set from the config
        #[arg(long)]
        automated: bool,

        /// Changes as STEP_INDEX=STATUS, applied in order
        #[arg(value_parser = parse_change)]
        changes: Vec<(usize, Status)>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Print the incremental resolver decision table
    Table,
}

fn parse_change(s: &str) -> Result<(usize, Status), String> {
    let (index, status) = s
        .split_once('=')
        .ok_or_else(|| format!("expected STEP_INDEX=STATUS, got {:?}", s))?;
    let index = index
        .trim()
        .parse::<usize>()
        .map_err(|e| format!("invalid step index {:?}: {}", index, e))?;
    let status = status.parse::<Status>().map_err(|e| e.to_string())?;
    Ok((index, status))
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::load_or_default(),
    };
    init_tracing(&config.logging);

    match cli.command {
        Commands::Aggregate { statuses, json } => {
            let report = StatusReport::from_statuses(statuses.iter().map(|s| s.canonical()));
            let status = aggregate(&report);
            tracing::debug!(steps = statuses.len(), %status, "aggregated");
            if json {
                let output = serde_json::json!({ "status": status, "report": report });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("{}", status);
            }
        }
        Commands::Replay {
            steps,
            automated,
            changes,
            json,
        } => {
            let kind = if automated {
                config.automated_kind()?
            } else {
                ExecutionKind::Manual
            };
            let mut execution = Execution::new(ParentRef::new(), kind, steps);
            tracing::info!(execution = %execution.id(), steps, kind = %execution.kind(), "replaying");

            let mut outcomes = Vec::with_capacity(changes.len());
            for (index, status) in changes {
                let Some(step) = execution.step_at(index) else {
                    bail!("step index {} out of range (execution has {} steps)", index, steps);
                };
                let step_id = step.id();
                let outcome = execution
                    .change_step_status(step_id, status)
                    .with_context(|| format!("step {} -> {}", index, status))?;
                if !json {
                    println!(
                        "step {:<3} -> {:<10} | execution {:<10} | {:<11} | {}",
                        index,
                        status,
                        outcome.current,
                        outcome.path.to_string(),
                        if outcome.notified_parent() { "parent notified" } else { "" }
                    );
                }
                outcomes.push(outcome);
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&outcomes)?);
            } else {
                println!("final status: {}", execution.status());
            }
        }
        Commands::Table => {
            println!(
                "{:<12} | {:<12} | {:<12} | Resolved",
                "New step", "Former exec", "Former step"
            );
            println!("{:-<12}-|-{:-<12}-|-{:-<12}-|-{:-<10}", "", "", "", "");
            for new_step in CanonicalStatus::ALL {
                for former_exec in CanonicalStatus::ALL {
                    for former_step in CanonicalStatus::ALL {
                        let resolved = resolve_canonical(new_step, former_exec, former_step)
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| "-".to_string());
                        println!(
                            "{:<12} | {:<12} | {:<12} | {}",
                            new_step, former_exec, former_step, resolved
                        );
                    }
                }
            }
        }
    }

    Ok(())
}
