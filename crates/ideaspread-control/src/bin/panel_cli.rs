use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use ideaspread_control::{
    HttpSimulationService, PanelConfig, ParameterStore, RunController, RunState, RunStatistics,
    SimulationParameters,
};
use owo_colors::OwoColorize;

#[derive(Parser, Debug)]
#[command(
    name = "ideaspread-panel",
    version,
    about = "Drive the ideaspread simulation service from the terminal"
)]
struct Cli {
    /// Base URL for the running simulation service.
    #[arg(
        long,
        env = "IDEASPREAD_SERVICE_URL",
        default_value = "http://127.0.0.1:5000"
    )]
    base_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the simulation parameters and their current defaults.
    Params,
    /// Trigger a run and report the rendered video URL and statistics.
    Run {
        /// Parameter overrides as name=value pairs (e.g. --set num_agents=2000).
        #[arg(long = "set", value_name = "NAME=VALUE")]
        set: Vec<String>,
        /// Seconds to wait for the service before giving up.
        #[arg(long, default_value_t = 120)]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Params => params_command(),
        Command::Run { set, timeout_secs } => {
            run_command(cli.base_url, set, timeout_secs).await
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn params_command() -> Result<()> {
    let store = ParameterStore::new(SimulationParameters::default());
    println!("{:<24} {}", "PARAMETER".bold().cyan(), "DEFAULT".bold().cyan());
    println!("{}", "-".repeat(40).dimmed());
    for entry in store.entries() {
        println!("{:<24} {}", entry.name.bold(), entry.default);
    }
    Ok(())
}

async fn run_command(base_url: String, overrides: Vec<String>, timeout_secs: u64) -> Result<()> {
    let config = PanelConfig {
        base_url,
        request_timeout: Duration::from_secs(timeout_secs),
        ..PanelConfig::default()
    };
    let service =
        HttpSimulationService::new(&config).context("failed to build HTTP client")?;
    let controller = RunController::new(config, service);

    for entry in &overrides {
        let Some((name, raw)) = entry.split_once('=') else {
            bail!("override '{entry}' is not of the form name=value");
        };
        if !controller.set_field(name.trim(), raw) {
            bail!("override '{entry}' was rejected: unknown parameter or non-numeric value");
        }
    }

    println!("{}", "Running simulation...".dimmed());
    match controller.run().await {
        RunState::Success { media_url, statistics } => {
            println!("{}", "Simulation complete".green().bold());
            println!("video: {}", media_url.cyan());
            print_statistics(&statistics);
            Ok(())
        }
        RunState::Failed { message } => {
            eprintln!("{} {}", "Simulation failed:".red().bold(), message);
            std::process::exit(1);
        }
        other => bail!("run resolved to unexpected state: {other:?}"),
    }
}

fn print_statistics(statistics: &RunStatistics) {
    println!(
        "reached: {} agents ({})",
        statistics.total_infected.bold(),
        format!("{:.1}%", statistics.final_infection_rate * 100.0).yellow()
    );
    if let Some(days) = statistics.duration_days {
        println!("duration: {days:.1} simulated days");
    }
}
