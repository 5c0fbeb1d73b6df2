//! api-monitor - HTTP API Availability Monitor
//!
//! Probes configured endpoints, reports their status and latency, and alerts
//! when they fail or recover.

mod cache;
mod cli;
mod config;
mod notify;
mod probe;
mod report;
mod scheduler;
mod web;

use cli::{Cli, Commands};
use config::{ConfigFile, MonitorConfig, ServerConfig};
use notify::NotificationSink;
use probe::{HttpClient, ReqwestClient};
use report::ConsoleReporter;
use scheduler::{EndpointRegistry, Scheduler};
use web::{AppState, MonitorState, Server};

use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Interval used by `watch` and as the cache lifetime when none is configured.
const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<ExitCode, BoxError> {
    let cli = Cli::parse();
    let server_cfg = ServerConfig::load();

    let args = cli.command.run_args();
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| server_cfg.config_path.clone());

    let config = match MonitorConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            init_logging(None)?;
            tracing::error!("Failed to load {}: {}", config_path.display(), e);
            return Ok(ExitCode::FAILURE);
        }
    };

    init_logging(config.log_file.as_deref())?;
    tracing::info!(
        "Loaded {} endpoints from {}",
        config.endpoints.len(),
        config_path.display()
    );

    let interval = match &cli.command {
        Commands::Run(_) => config.interval(),
        Commands::Watch(watch) => Some(
            watch
                .interval
                .map(Duration::from_secs)
                .or(config.interval())
                .unwrap_or(DEFAULT_INTERVAL),
        ),
    };
    let web_port = match &cli.command {
        Commands::Watch(watch) if watch.web => Some(watch.port.unwrap_or(server_cfg.http_port)),
        _ => None,
    };

    let client: Arc<dyn HttpClient> = Arc::new(ReqwestClient::new()?);
    let registry = EndpointRegistry::new(config.endpoints.clone());
    let monitor = web_port.map(|_| Arc::new(MonitorState::new()));

    let format = args.format.unwrap_or(config.output_format);
    let mut scheduler = Scheduler::new(
        registry.clone(),
        client.clone(),
        interval.unwrap_or(DEFAULT_INTERVAL),
    )
    .with_reporter(Arc::new(ConsoleReporter::new(format, args.output.clone())));

    if let Some(monitor) = &monitor {
        scheduler = scheduler.with_reporter(monitor.clone());
    }
    let dashboard_alerts = monitor.clone().map(|m| m as Arc<dyn NotificationSink>);
    if let Some(notifier) = config
        .notifications
        .as_ref()
        .and_then(|settings| settings.notifier(dashboard_alerts))
    {
        scheduler = scheduler.with_notifier(notifier);
    }

    let Some(interval) = interval else {
        let status = scheduler.run_once().await;
        return Ok(ExitCode::from(status as u8));
    };

    let shutdown = CancellationToken::new();
    tokio::spawn(listen_for_shutdown(shutdown.clone()));

    let web_task = match (web_port, monitor) {
        (Some(port), Some(monitor)) => {
            let state = AppState {
                registry,
                monitor,
                client,
                config_file: Some(Arc::new(ConfigFile::new(config_path.clone(), config.clone()))),
            };
            let server = Server::new(port, state);
            let token = shutdown.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = server.start(token.clone()).await {
                    tracing::error!("Dashboard server failed: {}", e);
                    token.cancel();
                }
            }))
        }
        _ => None,
    };

    let code = match scheduler.run(interval, shutdown.clone()).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Scheduler failed to start: {}", e);
            ExitCode::FAILURE
        }
    };

    shutdown.cancel();
    if let Some(task) = web_task {
        if let Err(e) = task.await {
            tracing::error!("Dashboard task failed: {}", e);
        }
    }

    tracing::info!("Monitoring stopped");
    Ok(code)
}

/// Initialize logging to stderr, plus an optional log file without colors.
fn init_logging(log_file: Option<&Path>) -> Result<(), BoxError> {
    let file_layer = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("api_monitor=info".parse()?))
        .init();

    Ok(())
}

/// Cancel `token` on Ctrl-C or SIGTERM.
async fn listen_for_shutdown(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Received shutdown signal");
    token.cancel();
}
