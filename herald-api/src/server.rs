//! API HTTP server

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use herald_common::Signal;
use herald_dispatch::CampaignService;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;

use crate::{ApiConfig, ApiError, campaigns, tracking};

/// Build the router serving every endpoint.
pub fn router(service: Arc<CampaignService>, request_timeout: Duration) -> Router {
    Router::new()
        .route("/api/campaigns", post(campaigns::submit))
        .route("/api/campaigns/{id}", get(campaigns::status))
        .route("/api/campaigns/{id}/events", get(campaigns::events))
        .route("/track/open", get(tracking::open))
        .route("/track/click", get(tracking::click))
        .route("/health/live", get(liveness_handler))
        .with_state(service)
        .layer(TimeoutLayer::new(request_timeout))
}

/// HTTP server for campaign intake, status and engagement tracking
pub struct ApiServer {
    listener: TcpListener,
    router: Router,
}

impl ApiServer {
    /// Bind the listener and build the router.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the specified address fails.
    pub async fn new(config: &ApiConfig, service: Arc<CampaignService>) -> Result<Self, ApiError> {
        let listener = TcpListener::bind(&config.listen_address)
            .await
            .map_err(|e| ApiError::BindError {
                address: config.listen_address.clone(),
                source: e,
            })?;

        tracing::info!(
            address = %config.listen_address,
            "API server bound successfully"
        );

        Ok(Self {
            listener,
            router: router(service, config.request_timeout()),
        })
    }

    /// The address actually bound, useful when listening on port 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr, ApiError> {
        self.listener
            .local_addr()
            .map_err(|e| ApiError::ServerError(e.to_string()))
    }

    /// Run the server until a shutdown signal is received
    ///
    /// # Errors
    ///
    /// Returns an error if the server encounters a runtime error.
    pub async fn serve(
        self,
        mut shutdown: tokio::sync::broadcast::Receiver<Signal>,
    ) -> Result<(), ApiError> {
        tracing::info!("API server starting");

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("API server received shutdown signal");
            })
            .await
            .map_err(|e| ApiError::ServerError(e.to_string()))?;

        tracing::info!("API server stopped");
        Ok(())
    }
}

/// Liveness probe handler
async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
