// src/main.rs
use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use service_bringup::{
    checks::CheckSuite,
    config::{self, PlanConfig, Settings},
    metrics::MetricsRegistry,
    orchestrator::run_plan,
    report::{self, aggregate, render_summary},
};

mod cli;

use cli::{Cli, Commands, LogFormat, RunArgs};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(&cli) {
        eprintln!("failed to initialise logging: {e:#}");
        return ExitCode::from(2);
    }

    let outcome = match cli.command {
        Commands::Run(ref args) => run(args, cli.settings.as_deref()).await,
        Commands::Validate { ref plan } => validate(plan).await,
        Commands::Status { ref report } => status(report.as_deref(), cli.settings.as_deref()).await,
        Commands::Checks { ref plan } => checks(plan).await,
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!("{e:#}");
            eprintln!("{} {e:#}", "error:".red().bold());
            ExitCode::from(2)
        }
    }
}

fn init_tracing(cli: &Cli) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&cli.log_level))?
        .add_directive("hyper=info".parse()?)
        .add_directive("reqwest=info".parse()?);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match cli.log_format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

async fn run(args: &RunArgs, settings_file: Option<&Path>) -> Result<bool> {
    info!("Loading plan from: {}", args.plan.display());
    let plan = config::load_plan(&args.plan).await?;
    let mut settings = config::load_settings(&plan, settings_file)?;
    apply_overrides(&mut settings, args);

    if args.skip_if_ready && previous_run_ready(&plan, &settings).await {
        println!(
            "{} {} already READY for this plan, nothing to do",
            "skipped:".green().bold(),
            settings.report_path.display()
        );
        return Ok(true);
    }

    let registry = match &settings.metrics_path {
        Some(_) => Some(MetricsRegistry::new()?),
        None => None,
    };

    let cancel = CancellationToken::new();
    spawn_cancellation(cancel.clone(), settings.deadline());

    let client = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;

    let report = run_plan(
        &plan,
        &settings,
        &client,
        cancel.clone(),
        registry.as_ref().map(MetricsRegistry::collector),
    )
    .await?;

    report::write_artifact(&report, &settings.report_path).await?;
    if let Some(path) = &settings.json_report_path {
        report::write_json(&report, path).await?;
    }
    if let (Some(registry), Some(path)) = (&registry, &settings.metrics_path) {
        if let Err(e) = registry.write_textfile(path).await {
            warn!("Failed to write metrics to {}: {:#}", path.display(), e);
        }
    }

    print!("{}", render_summary(&report));
    Ok(report.ready())
}

fn apply_overrides(settings: &mut Settings, args: &RunArgs) {
    if let Some(policy) = args.policy {
        settings.policy = policy;
    }
    if let Some(path) = &args.report {
        settings.report_path = path.clone();
    }
    if let Some(path) = &args.json_report {
        settings.json_report_path = Some(path.clone());
    }
    if let Some(path) = &args.metrics_file {
        settings.metrics_path = Some(path.clone());
    }
    if let Some(secs) = args.deadline_secs {
        settings.deadline_secs = Some(secs);
    }
}

async fn previous_run_ready(plan: &PlanConfig, settings: &Settings) -> bool {
    match report::load_artifact(&settings.report_path).await {
        Ok(artifact) => artifact.ready() && artifact.plan_digest() == Some(plan.digest().as_str()),
        Err(e) => {
            info!("No usable previous report: {}", e);
            false
        }
    }
}

/// Cancel on Ctrl+C, SIGTERM or when the deadline passes.
fn spawn_cancellation(cancel: CancellationToken, deadline: Option<Duration>) {
    tokio::spawn(async move {
        let deadline = async {
            match deadline {
                Some(deadline) => tokio::time::sleep(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = shutdown_signal() => warn!("Shutdown signal received, cancelling run"),
            _ = deadline => warn!("Deadline reached, cancelling run"),
        }
        cancel.cancel();
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn validate(path: &Path) -> Result<bool> {
    let plan = config::load_plan(path).await?;
    let client = reqwest::Client::new();
    let dependency_plan = service_bringup::service::DependencyPlan::from_config(&plan, &client)?;
    CheckSuite::from_config(&plan.checks, &client)?;

    println!("{} {}", "valid:".green().bold(), path.display());
    println!("  order:  {}", dependency_plan.ids().collect::<Vec<_>>().join(" -> "));
    println!("  checks: {}", plan.checks.len());
    println!("  digest: {}", plan.digest());
    Ok(true)
}

async fn status(path: Option<&Path>, settings_file: Option<&Path>) -> Result<bool> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let empty = PlanConfig {
                settings: Settings::default(),
                units: Vec::new(),
                checks: Vec::new(),
            };
            config::load_settings(&empty, settings_file)?.report_path
        }
    };

    let artifact = report::load_artifact(&path).await?;
    for (key, value) in artifact.entries() {
        println!("{key}={value}");
    }
    Ok(artifact.ready())
}

async fn checks(path: &Path) -> Result<bool> {
    let plan = config::load_plan(path).await?;
    let client = reqwest::Client::new();
    let suite = CheckSuite::from_config(&plan.checks, &client)?;

    let results = suite.run_all(&[]).await;
    let report = aggregate(Vec::new(), results);
    print!("{}", render_summary(&report));
    Ok(report.ready())
}
