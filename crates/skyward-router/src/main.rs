//! Skyward router binary.
//!
//! Brings up the routing advisor on the local node and exposes the
//! `/route`, `/health` and `/stats` endpoints until a shutdown signal
//! arrives.

use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use skyward_router::server::{self, ApiState};
use skyward_router::{RouterConfig, RoutingAdvisor};
use skyward_strategy::routing::{BatteryAware, Composite, DistanceBased};
use skyward_strategy::{registry, RoutingStrategy};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = RouterConfig::from_env()?;
    init_logging(&config.log_level, config.structured_logging);

    info!("starting UAV router agent");
    config.validate().inspect_err(|e| {
        error!(error = %e, "invalid configuration");
    })?;

    info!(
        node = %config.node_name,
        algorithm = %config.algorithm,
        port = config.api_port,
        "configuration loaded"
    );

    register_builtin_strategies(&config);
    let strategy = registry::routing(&config.algorithm).inspect_err(|e| {
        error!(
            error = %e,
            available = ?registry::routing_names(),
            "algorithm not available"
        );
    })?;

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

    let advisor = Arc::new(RoutingAdvisor::new(
        config.node_name.clone(),
        store,
        strategy,
    ));
    advisor.clone().start(cancel.clone()).await.inspect_err(|e| {
        error!(error = %e, "failed to start routing advisor");
    })?;

    let state = Arc::new(ApiState { advisor });
    server::serve(state, config.api_port, cancel).await?;

    info!("UAV router agent stopped");
    Ok(())
}

fn register_builtin_strategies(config: &RouterConfig) {
    let distance: Arc<dyn RoutingStrategy> = Arc::new(DistanceBased::new(config.max_distance));
    let battery: Arc<dyn RoutingStrategy> = Arc::new(BatteryAware::new(config.min_battery));

    registry::register_routing(distance.clone());
    registry::register_routing(battery.clone());

    // The stock blend: 70% distance, 30% battery.
    match Composite::new(vec![distance, battery], vec![0.7, 0.3]) {
        Ok(composite) => registry::register_routing(Arc::new(composite)),
        Err(err) => warn!(error = %err, "skipping composite registration"),
    }

    info!(algorithms = ?registry::routing_names(), "built-in algorithms registered");
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
