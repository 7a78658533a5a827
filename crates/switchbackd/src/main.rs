//! switchbackd — the Switchback daemon.
//!
//! Single binary that assembles the DR control plane:
//! - Run-state store (redb)
//! - Provider backend (`RegionController`)
//! - Periodic health loop (probe → evaluate → persist → alert)
//! - Orchestration engine (failover/failback, trigger-driven)
//! - REST API
//!
//! The bundled backend is the simulated provider, which makes the daemon
//! self-contained for game-day drills and local development; cloud
//! adapters plug in behind the same `RegionController` seam.
//!
//! # Usage
//!
//! ```text
//! switchbackd run --config switchback.toml --port 8787 --data-dir /var/lib/switchback
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use switchback_api::ApiState;
use switchback_core::{DrConfig, RegionController, SimRegion};
use switchback_engine::OrchestrationEngine;
use switchback_health::{HealthEvaluator, HealthProbe};
use switchback_notify::{LogSink, NotificationSink, WebhookSink};
use switchback_state::RunStateStore;

#[derive(Parser)]
#[command(name = "switchbackd", about = "Switchback DR control-plane daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the control plane: health loop plus trigger API.
    Run {
        /// Path to switchback.toml. Drill defaults are used when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on.
        #[arg(long, default_value = "8787")]
        port: u16,

        /// Data directory for persistent state.
        #[arg(long, default_value = "/var/lib/switchback")]
        data_dir: PathBuf,

        /// Health check interval in seconds.
        #[arg(long, default_value = "60")]
        health_interval: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,switchbackd=debug,switchback=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            port,
            data_dir,
            health_interval,
        } => run(config, port, data_dir, health_interval).await,
    }
}

async fn run(
    config_path: Option<PathBuf>,
    port: u16,
    data_dir: PathBuf,
    health_interval: u64,
) -> anyhow::Result<()> {
    info!("Switchback daemon starting");

    let config = match &config_path {
        Some(path) => DrConfig::from_file(path)?,
        None => {
            warn!("no config file given, using drill defaults");
            DrConfig::drill_defaults()
        }
    };
    let config = Arc::new(config);
    info!(
        primary = %config.primary.region,
        standby = %config.standby.region,
        domain = %config.dns.domain,
        "configuration loaded"
    );

    // Ensure data directory exists.
    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join("switchback.redb");

    // ── Initialize subsystems ──────────────────────────────────

    // Run-state store.
    let store = RunStateStore::open(&db_path)?;
    info!(path = ?db_path, "run-state store opened");

    // Provider backend. Cloud adapters implement `RegionController`; the
    // simulated provider keeps the daemon self-contained for drills.
    let controller: Arc<dyn RegionController> = Arc::new(SimRegion::from_config(&config));
    info!("simulated provider initialized");

    // Notification sink.
    let sink: Arc<dyn NotificationSink> = match &config.notify.webhook_url {
        Some(url) => {
            info!(%url, "webhook notifications enabled");
            Arc::new(WebhookSink::new(url)?)
        }
        None => Arc::new(LogSink),
    };

    // Orchestration engine + health components.
    let engine = Arc::new(OrchestrationEngine::new(
        controller.clone(),
        store.clone(),
        sink.clone(),
        config.clone(),
    ));
    let probe = Arc::new(HealthProbe::new(controller.clone(), config.clone()));
    let evaluator = Arc::new(HealthEvaluator::new(store.clone(), sink, config.clone()));
    info!("orchestration engine initialized");

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Health loop ────────────────────────────────────────────

    let health_probe = probe.clone();
    let health_evaluator = evaluator.clone();
    let health_shutdown = shutdown_rx.clone();
    let interval = Duration::from_secs(health_interval);
    let health_handle = tokio::spawn(async move {
        run_health_loop(health_probe, health_evaluator, interval, health_shutdown).await;
    });
    info!(interval_secs = health_interval, "health loop started");

    // ── Start API server ───────────────────────────────────────

    let state = ApiState {
        store,
        engine,
        probe,
        evaluator,
        controller,
    };
    let router = switchback_api::build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    // Wait for the health loop.
    let _ = health_handle.await;

    info!("Switchback daemon stopped");
    Ok(())
}

/// Periodic probe/evaluate cycle until shutdown.
async fn run_health_loop(
    probe: Arc<HealthProbe>,
    evaluator: Arc<HealthEvaluator>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                let sample = probe.sample().await;
                if let Err(e) = evaluator.run_cycle(sample).await {
                    error!(error = %e, "health cycle failed to persist");
                }
            }
            _ = shutdown.changed() => {
                debug!("health loop shutting down");
                break;
            }
        }
    }
}
