//! HTTP API for the routing advisor.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use skyward_strategy::EndpointWeight;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::advisor::{CacheStats, RoutingAdvisor};
use crate::error::{Result, RouterError};

/// Grace period for draining connections on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Shared API state.
pub struct ApiState {
    pub advisor: Arc<RoutingAdvisor>,
}

/// Creates the API router.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/route", get(handle_route))
        .route("/health", get(handle_health))
        .route("/stats", get(handle_stats))
        .with_state(state)
}

/// Runs the HTTP server until cancellation, then drains with a grace
/// period.
pub async fn serve(state: Arc<ApiState>, port: u16, cancel: CancellationToken) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(RouterError::Io)?;
    info!(address = %addr, "routing API listening");

    let shutdown_cancel = cancel.clone();
    let server = axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown_cancel.cancelled().await })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => result.map_err(RouterError::Io)?,
        () = async {
            cancel.cancelled().await;
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        } => warn!("shutdown grace period expired, dropping connections"),
    }

    info!("routing API stopped");
    Ok(())
}

#[derive(Debug, Deserialize)]
struct RouteQuery {
    service: Option<String>,
}

#[derive(Debug, Serialize)]
struct RouteResponse {
    service: String,
    algorithm: String,
    weights: Vec<EndpointWeight>,
    endpoints_count: usize,
    duration_ms: u64,
    duration_us: u64,
}

/// `GET /route?service=namespace/name`
async fn handle_route(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<RouteQuery>,
) -> Response {
    let Some(service) = query.service.filter(|s| !s.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "missing service parameter").into_response();
    };

    let started = Instant::now();
    match state.advisor.compute_routing(&service) {
        Ok(weights) => {
            let elapsed = started.elapsed();
            info!(
                service = %service,
                endpoints = weights.len(),
                duration_us = elapsed.as_micros() as u64,
                "routing computed"
            );
            Json(RouteResponse {
                service,
                algorithm: state.advisor.algorithm().to_string(),
                endpoints_count: weights.len(),
                weights,
                duration_ms: elapsed.as_millis() as u64,
                duration_us: elapsed.as_micros() as u64,
            })
            .into_response()
        }
        Err(err) => {
            warn!(service = %service, error = %err, "routing computation failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    node: String,
}

/// `GET /health`
async fn handle_health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        node: state.advisor.node_name().to_string(),
    })
}

/// `GET /stats`
async fn handle_stats(State(state): State<Arc<ApiState>>) -> Json<CacheStats> {
    Json(state.advisor.cache_stats())
}
