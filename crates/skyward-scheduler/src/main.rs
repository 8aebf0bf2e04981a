//! Skyward scheduler binary.
//!
//! Registers the built-in placement strategies, wires the configured one
//! to the cluster store, and runs the placement control loop until a
//! shutdown signal arrives.

use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use skyward_scheduler::{PlacementController, SchedulerConfig};
use skyward_strategy::placement::{BatteryAware, Composite, DistanceBased, NetworkLatency};
use skyward_strategy::{registry, PlacementStrategy};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = SchedulerConfig::from_env()?;
    init_logging(&config.log_level, config.structured_logging);

    info!("starting UAV scheduler");
    config.validate().inspect_err(|e| {
        error!(error = %e, "invalid configuration");
    })?;

    info!(
        scheduler = %config.scheduler_name,
        algorithm = %config.algorithm_name,
        namespace = %config.namespace,
        "configuration loaded"
    );

    register_builtin_strategies(&config);
    let strategy = registry::placement(&config.algorithm_name).inspect_err(|e| {
        error!(
            error = %e,
            available = ?registry::placement_names(),
            "algorithm not available"
        );
    })?;
    info!(algorithm = strategy.name(), "strategy loaded");

    let store = skyward_store::connect(&config.store_config())
        .await
        .inspect_err(|e| {
            error!(error = %e, "failed to initialise cluster store client");
        })?;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received, initiating graceful shutdown");
        signal_cancel.cancel();
    });

    let controller = PlacementController::new(config, store, strategy);
    controller.run(cancel).await?;

    info!("UAV scheduler stopped");
    Ok(())
}

fn register_builtin_strategies(config: &SchedulerConfig) {
    let distance: Arc<dyn PlacementStrategy> = Arc::new(DistanceBased::new(
        config.target_latitude,
        config.target_longitude,
    ));
    let battery: Arc<dyn PlacementStrategy> = Arc::new(BatteryAware::new(config.min_battery));

    registry::register_placement(distance.clone());
    registry::register_placement(battery.clone());
    registry::register_placement(Arc::new(NetworkLatency::new(config.max_latency)));

    // The stock blend: 60% distance, 40% battery.
    match Composite::new(vec![distance, battery], vec![0.6, 0.4]) {
        Ok(composite) => registry::register_placement(Arc::new(composite)),
        Err(err) => warn!(error = %err, "skipping composite registration"),
    }

    info!(algorithms = ?registry::placement_names(), "built-in algorithms registered");
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
