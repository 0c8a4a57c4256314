//! Service wiring: middleware, health endpoint and the serve loop.

use axum::{Json, Router, routing::get};
use serde::Serialize;
use std::time::Duration;
use tokio::signal;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::billing::{BillingStore, FaspayClient, InMemoryBillingStore, PaymentGateway};
use crate::config::Config;
use crate::error::{KakasakuError, Result};
use crate::http::{AppState, router};

/// Request ID generator for `x-request-id`.
#[derive(Clone, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let request_id = Uuid::new_v4().to_string().parse().ok()?;
        Some(RequestId::new(request_id))
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: env!("CARGO_PKG_NAME"),
    })
}

/// Kakasaku routes plus health, request IDs and HTTP tracing.
pub fn app<S, G>(state: AppState<S, G>) -> Router
where
    S: BillingStore + Clone + 'static,
    G: PaymentGateway + 'static,
{
    router(state)
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Run the service until Ctrl+C or SIGTERM.
///
/// Payments live in an [`InMemoryBillingStore`]; a persistent deployment
/// supplies its own [`BillingStore`] through [`serve_with`].
pub async fn serve(config: Config) -> Result<()> {
    let gateway = FaspayClient::new(config.gateway.clone())?;
    serve_with(config, InMemoryBillingStore::new(), gateway).await
}

/// Run the service over a caller-provided store and gateway.
pub async fn serve_with<S, G>(config: Config, store: S, gateway: G) -> Result<()>
where
    S: BillingStore + Clone + 'static,
    G: PaymentGateway + Clone + 'static,
{
    let addr = config.server.addr().map_err(|e| {
        KakasakuError::internal(format!("Invalid server address in config: {}", e))
    })?;

    let state = AppState::new(store, gateway, &config.billing);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| KakasakuError::internal(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!(target: "kakasaku::server", "Server starting on http://{}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| KakasakuError::internal(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(target: "kakasaku::server", error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(target: "kakasaku::server", error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!(target: "kakasaku::server", "Received Ctrl+C signal, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!(target: "kakasaku::server", "Received terminate signal, starting graceful shutdown");
        },
    }

    // Grace period for in-flight inquiries
    tokio::time::sleep(Duration::from_secs(1)).await;
    tracing::info!(target: "kakasaku::server", "Shutdown complete");
}
