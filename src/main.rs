#![forbid(unsafe_code)]

//! `incident-commander`: incident triage server and one-shot runner.
//!
//! Loads settings, then either serves the HTTP front door or runs a single
//! incident from a JSON file and prints the composed result.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use incident_commander::models::incident::{IncidentInput, Severity};
use incident_commander::{http, AppError, IncidentOrchestrator, Result, Settings};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "incident-commander", about = "Incident triage pipeline", version, long_about = None)]
struct Cli {
    /// Path to an optional TOML settings file; environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP front door.
    Serve,
    /// Run one incident and print the result as JSON.
    Run {
        /// JSON incident file; defaults to the checkout-api demo scenario.
        #[arg(long)]
        input: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let settings = Settings::load(args.config.as_deref())?;
    info!(
        store_enabled = settings.store_enabled(),
        webhook_enabled = settings.webhook_enabled(),
        timeout_seconds = settings.request_timeout_seconds,
        "settings loaded"
    );
    let orchestrator = Arc::new(IncidentOrchestrator::from_settings(&settings)?);

    match args.command {
        Command::Serve => {
            let ct = CancellationToken::new();
            let server_ct = ct.clone();
            let server = tokio::spawn(http::serve(
                Arc::clone(&orchestrator),
                settings.http_port,
                server_ct,
            ));

            shutdown_signal().await;
            info!("shutdown signal received");
            ct.cancel();

            match server.await {
                Ok(result) => result?,
                Err(err) => error!(%err, "server task panicked"),
            }
            Ok(())
        }
        Command::Run { input } => {
            let incident = match input {
                Some(path) => read_incident(&path)?,
                None => demo_incident(),
            };
            incident.validate()?;

            let result = orchestrator.run(incident).await;
            let rendered = serde_json::to_string_pretty(&result)
                .map_err(|err| AppError::Io(format!("failed to render result: {err}")))?;
            println!("{rendered}");
            Ok(())
        }
    }
}

fn read_incident(path: &std::path::Path) -> Result<IncidentInput> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw)
        .map_err(|err| AppError::Validation(format!("invalid incident file: {err}")))
}

fn demo_incident() -> IncidentInput {
    IncidentInput {
        service: "checkout-api".into(),
        severity: Severity::High,
        summary: "Latency spikes after deploy".into(),
        signals: vec!["p95 latency > 2.5s".into(), "error rate 7%".into()],
        recent_deploy_sha: Some("abc1234".into()),
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    // Logs go to stderr so `run` output stays pipeable.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter).with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
