//! tradeguard - operator CLI for the risk-gating core.
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tradeguard_cli::{AppConfig, Application};
use tradeguard_core::{ActionParams, PortfolioSnapshot};
use tradeguard_risk::BreakerType;

/// Risk gating for autonomous trading agents
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via TRADEGUARD_CONFIG env var)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a proposed action against limits and breakers
    Check {
        /// ActionParams as JSON
        #[arg(long)]
        action: String,
        /// PortfolioSnapshot as JSON
        #[arg(long)]
        portfolio: String,
    },
    /// Compute portfolio risk statistics
    Analyze {
        /// Equity curve as a JSON array of numbers
        #[arg(long)]
        equity: String,
        /// Position weights as a JSON array of numbers
        #[arg(long, default_value = "[]")]
        weights: String,
    },
    /// Show every circuit breaker
    Breakers,
    /// Trip a circuit breaker
    Trip {
        breaker: BreakerType,
        #[arg(long)]
        reason: String,
    },
    /// Manually reset a circuit breaker to closed
    Reset { breaker: BreakerType },
    /// Record a half-open probe outcome
    Probe {
        breaker: BreakerType,
        #[arg(long, conflicts_with = "failure", required_unless_present = "failure")]
        success: bool,
        #[arg(long)]
        failure: bool,
        /// Failure reason
        #[arg(long, default_value = "probe failed")]
        reason: String,
    },
    /// Print Prometheus metrics, with breaker status read from the state store
    Metrics,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    tradeguard_telemetry::init_logging()?;

    // CLI arg > TRADEGUARD_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("TRADEGUARD_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = AppConfig::from_file(&config_path)?;

    let mut app = Application::new(config)?;

    match args.command {
        Command::Check { action, portfolio } => {
            let action: ActionParams = serde_json::from_str(&action)?;
            let portfolio: PortfolioSnapshot = serde_json::from_str(&portfolio)?;
            print_json(&app.check(&action, &portfolio)?)?;
        }
        Command::Analyze { equity, weights } => {
            let equity: Vec<f64> = serde_json::from_str(&equity)?;
            let weights: Vec<f64> = serde_json::from_str(&weights)?;
            print_json(&app.analyze(&equity, &weights)?)?;
        }
        Command::Breakers => print_json(&app.breakers()?)?,
        Command::Trip { breaker, reason } => print_json(&app.trip(breaker, &reason)?)?,
        Command::Reset { breaker } => print_json(&app.reset(breaker)?)?,
        Command::Probe {
            breaker,
            success,
            reason,
            ..
        } => print_json(&app.probe(breaker, success, &reason)?)?,
        Command::Metrics => print!("{}", app.metrics_text()?),
    }

    app.close()?;
    Ok(())
}
