//! Skyward agent binary.
//!
//! Samples telemetry for the local node on a fixed interval and publishes
//! it to the cluster store with retry, keeping the record's status phase
//! in step with the node's health. On shutdown the phase is set to
//! Inactive so consumers can tell a stopped agent from a stale one.

mod config;
mod error;
mod sampler;

use std::sync::Arc;
use std::time::{Duration, Instant};

use skyward_model::{HealthStatus, NodePhase};
use skyward_store::ClusterStore;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use config::AgentConfig;
use sampler::TelemetrySampler;

/// Budget for the final status write during shutdown.
const SHUTDOWN_STATUS_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AgentConfig::from_env()?;
    init_logging(&config.log_level, config.structured_logging);

    info!(version = env!("CARGO_PKG_VERSION"), "starting UAV agent");
    config.validate().inspect_err(|e| {
        error!(error = %e, "invalid configuration");
    })?;

    info!(
        node = %config.node_name,
        namespace = %config.namespace,
        interval_secs = config.collection_interval,
        "configuration loaded"
    );

    let store = skyward_store::connect(&config.store_config())
        .await
        .inspect_err(|e| {
            error!(error = %e, "failed to initialise cluster store client");
        })?;
    let sampler = TelemetrySampler::new(&config);

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received, initiating graceful shutdown");
        signal_cancel.cancel();
    });

    run_collection_loop(&config, &store, &sampler, &cancel).await;

    // Best-effort: mark the node inactive so readers can tell shutdown
    // from staleness.
    match tokio::time::timeout(
        SHUTDOWN_STATUS_TIMEOUT,
        store.update_status(&config.node_name, NodePhase::Inactive),
    )
    .await
    {
        Err(_) => warn!("status update timed out on shutdown"),
        Ok(Err(err)) => warn!(error = %err, "failed to update status on shutdown"),
        Ok(Ok(())) => {}
    }

    info!("UAV agent stopped");
    Ok(())
}

async fn run_collection_loop(
    config: &AgentConfig,
    store: &Arc<dyn ClusterStore>,
    sampler: &TelemetrySampler,
    cancel: &CancellationToken,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(config.collection_interval));
    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                info!("collection loop stopped");
                return;
            }
            _ = ticker.tick() => {
                // Keep sampling through failures; the next tick retries.
                if let Err(err) = collect_and_publish(store, sampler, cancel).await {
                    error!(error = %err, "collection cycle failed");
                }
            }
        }
    }
}

async fn collect_and_publish(
    store: &Arc<dyn ClusterStore>,
    sampler: &TelemetrySampler,
    cancel: &CancellationToken,
) -> error::Result<()> {
    let started = Instant::now();

    let metrics = sampler.sample();
    let health_status = metrics
        .health
        .as_ref()
        .map_or(HealthStatus::Unknown, |h| h.status);

    store.upsert_telemetry_with_retry(&metrics, cancel).await?;

    let phase = phase_for(health_status);
    if let Err(err) = store.update_status(&metrics.node_name, phase).await {
        warn!(error = %err, "failed to update status");
    }

    if let Some(health) = &metrics.health {
        for warning in &health.warnings {
            warn!(warning = %warning, "health warning");
        }
        for message in &health.errors {
            error!(message = %message, "health error");
        }
    }

    info!(
        node = %metrics.node_name,
        battery = metrics.battery.remaining_percent,
        health = ?health_status,
        phase = %phase,
        duration_ms = started.elapsed().as_millis() as u64,
        "telemetry published"
    );
    Ok(())
}

/// Status phase derived from the health assessment.
fn phase_for(status: HealthStatus) -> NodePhase {
    match status {
        HealthStatus::Critical => NodePhase::Error,
        HealthStatus::Warning | HealthStatus::Healthy => NodePhase::Active,
        HealthStatus::Unknown => NodePhase::Unknown,
    }
}

fn init_logging(level: &str, structured: bool) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    if structured {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl+C"),
        () = terminate => info!("received SIGTERM"),
    }
}
