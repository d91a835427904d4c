// src/cli.rs
use clap::{Args, Parser, Subcommand, ValueEnum};
use service_bringup::config::FailurePolicy;
use std::path::PathBuf;

/// Library and binary targets at `info`; everything else stays quiet.
pub const DEFAULT_LOG_FILTER: &str = "service_bringup=info,bringup=info";

/// Bring up a set of dependent services and verify the environment is ready.
#[derive(Parser, Debug)]
#[command(name = "bringup", version, about, long_about = None)]
pub struct Cli {
    /// Log filter (trace, debug, info, warn, error or an EnvFilter directive).
    #[arg(long, global = true, default_value = DEFAULT_LOG_FILTER)]
    pub log_level: String,

    /// Log output format.
    #[arg(long, global = true, default_value = "text")]
    pub log_format: LogFormat,

    /// Settings file layered over the plan's `settings` block.
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start every unit in dependency order, run the checks, write the report.
    Run(RunArgs),

    /// Parse and validate a plan without starting anything.
    Validate {
        /// Plan file (YAML or JSON).
        plan: PathBuf,
    },

    /// Print a previously written status artifact.
    Status {
        /// Artifact path (defaults to the configured report path).
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Run only the plan's checks, without starting units.
    Checks {
        /// Plan file (YAML or JSON).
        plan: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Plan file (YAML or JSON).
    pub plan: PathBuf,

    /// Failure policy override.
    #[arg(long, value_parser = parse_policy)]
    pub policy: Option<FailurePolicy>,

    /// Status artifact path override.
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Also write the full report as JSON.
    #[arg(long)]
    pub json_report: Option<PathBuf>,

    /// Write Prometheus metrics in textfile format.
    #[arg(long)]
    pub metrics_file: Option<PathBuf>,

    /// Cancel the run after this many seconds.
    #[arg(long)]
    pub deadline_secs: Option<u64>,

    /// Exit early if the existing artifact is READY for this exact plan.
    #[arg(long)]
    pub skip_if_ready: bool,
}

fn parse_policy(value: &str) -> Result<FailurePolicy, String> {
    value.parse().map_err(|e| format!("{e}"))
}
