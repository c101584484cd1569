//! external-dns webhook HTTP server
//!
//! Routes:
//!
//! - `GET /` negotiation, returns the domain filter
//! - `GET /records` current records
//! - `POST /records` apply a change-set
//! - `POST /adjustendpoints` normalize proposed endpoints
//! - `GET /healthz` liveness
//! - `GET /metrics` Prometheus text
//!
//! Every webhook response carries the external-dns media type.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, error, info, warn};

use crate::constants::WEBHOOK_CONTENT_TYPE;
use crate::endpoint::{Changes, Endpoint};
use crate::metrics;
use crate::provider::CloudDnsProvider;

type SharedProvider = Arc<CloudDnsProvider>;

/// Builds the webhook router around a provider
pub fn router(provider: SharedProvider) -> Router {
    Router::new()
        .route("/", get(negotiate))
        .route("/records", get(get_records).post(apply_changes))
        .route("/adjustendpoints", post(adjust_endpoints))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_text))
        .with_state(provider)
}

/// Serves the webhook until `shutdown` resolves
pub async fn serve<F>(addr: SocketAddr, provider: SharedProvider, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Webhook server listening on {}", listener.local_addr()?);

    axum::serve(listener, router(provider))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Webhook server failed")?;

    info!("Webhook server stopped");
    Ok(())
}

/// Resolves on SIGTERM or Ctrl-C
pub async fn shutdown_signal() {
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = terminate => info!("SIGTERM received"),
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("Ctrl-C received"),
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        },
    }
}

//==============================================================================
// Handlers
//==============================================================================

async fn negotiate(State(provider): State<SharedProvider>) -> Response {
    webhook_json("negotiate", StatusCode::OK, provider.domain_filter())
}

async fn get_records(State(provider): State<SharedProvider>) -> Response {
    match provider.records().await {
        Ok(endpoints) => {
            debug!("Returning {} endpoints", endpoints.len());
            webhook_json("records", StatusCode::OK, &endpoints)
        }
        Err(e) => {
            error!("Failed to fetch records: {}", e);
            webhook_error("records", StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch records")
        }
    }
}

async fn apply_changes(State(provider): State<SharedProvider>, body: Bytes) -> Response {
    let changes: Changes = match serde_json::from_slice(&body) {
        Ok(changes) => changes,
        Err(e) => {
            warn!("Rejecting malformed change-set: {}", e);
            return webhook_error(
                "apply",
                StatusCode::BAD_REQUEST,
                &format!("invalid request body: {}", e),
            );
        }
    };

    match provider.apply_changes(&changes).await {
        Ok(()) => webhook_empty("apply", StatusCode::NO_CONTENT),
        Err(e) => {
            error!("Failed to apply changes: {}", e);
            webhook_error("apply", StatusCode::INTERNAL_SERVER_ERROR, "Failed to apply changes")
        }
    }
}

async fn adjust_endpoints(State(provider): State<SharedProvider>, body: Bytes) -> Response {
    let endpoints: Vec<Endpoint> = match serde_json::from_slice(&body) {
        Ok(endpoints) => endpoints,
        Err(e) => {
            warn!("Rejecting malformed endpoints: {}", e);
            return webhook_error(
                "adjustendpoints",
                StatusCode::BAD_REQUEST,
                &format!("invalid request body: {}", e),
            );
        }
    };
    let adjusted = provider.adjust_endpoints(endpoints);
    webhook_json("adjustendpoints", StatusCode::OK, &adjusted)
}

async fn healthz() -> Response {
    webhook_json("healthz", StatusCode::OK, &json!({ "status": "ok" }))
}

async fn metrics_text() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
        .into_response()
}

//==============================================================================
// Helpers
//==============================================================================

fn webhook_json<T: Serialize + ?Sized>(route: &str, status: StatusCode, body: &T) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => {
            metrics::record_request(route, status.as_u16());
            (status, [(header::CONTENT_TYPE, WEBHOOK_CONTENT_TYPE)], bytes).into_response()
        }
        Err(e) => {
            error!("Failed to encode response: {}", e);
            webhook_error(route, StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode response")
        }
    }
}

fn webhook_error(route: &str, status: StatusCode, message: &str) -> Response {
    metrics::record_request(route, status.as_u16());
    let body = json!({ "error": message }).to_string();
    (status, [(header::CONTENT_TYPE, WEBHOOK_CONTENT_TYPE)], body).into_response()
}

fn webhook_empty(route: &str, status: StatusCode) -> Response {
    metrics::record_request(route, status.as_u16());
    (status, [(header::CONTENT_TYPE, WEBHOOK_CONTENT_TYPE)]).into_response()
}
