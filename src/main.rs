use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use data_france::config::Config;
use data_france::constants::DEFAULT_CONFIG_FILE;
use data_france::logging::init_logging;
use data_france::metrics::{init_metrics, write_snapshot};
use data_france::pipeline::Orchestrator;

#[derive(Parser)]
#[command(name = "data_france")]
#[command(about = "Normalizes French administrative open data into ID-stable tables")]
#[command(version = "0.1.0")]
struct Cli {
    /// Configuration file (defaults apply when it does not exist)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the normalized tables
    Run {
        /// Tasks to run, with their dependencies (repeatable). Default: all
        #[arg(long = "task")]
        tasks: Vec<String>,
        /// Run tasks even when their inputs are unchanged
        #[arg(long)]
        force: bool,
        /// Write a Prometheus text snapshot of the run's metrics to this file
        #[arg(long)]
        metrics_file: Option<PathBuf>,
    },
    /// List the tasks with their dependencies and targets
    List {
        /// Print the task manifest as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    let _guard = init_logging(&config.logging);

    match cli.command {
        Commands::Run {
            tasks,
            force,
            metrics_file,
        } => {
            let metrics_handle = match &metrics_file {
                Some(_) => Some(init_metrics()?),
                None => None,
            };

            let orchestrator = Orchestrator::standard(config);
            let result = orchestrator.run(&tasks, force);

            if let (Some(handle), Some(path)) = (&metrics_handle, &metrics_file) {
                write_snapshot(handle, path)
                    .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
                info!("📈 Metrics written to {}", path.display());
            }

            let report = match result {
                Ok(report) => report,
                Err(e) => {
                    error!("❌ Run failed: {}", e);
                    return Err(e.into());
                }
            };

            println!("\n📊 Run {}:", report.run_id);
            for task in &report.executed {
                println!(
                    "   ✅ {} ({} new ids, {} rows filtered)",
                    task.task, task.ids_allocated, task.rows_filtered
                );
                for table in &task.tables {
                    println!("      {} rows → {}", table.rows, table.path.display());
                }
            }
            for task in &report.skipped {
                println!("   ⏭️  {} (up to date)", task);
            }
        }
        Commands::List { json } => {
            let orchestrator = Orchestrator::standard(config);
            let manifest = orchestrator.describe();
            if json {
                println!("{}", serde_json::to_string_pretty(&manifest)?);
            } else {
                for task in &manifest {
                    if task.task_deps.is_empty() {
                        println!("{}", task.name);
                    } else {
                        println!("{} (after {})", task.name, task.task_deps.join(", "));
                    }
                }
            }
        }
    }

    Ok(())
}
