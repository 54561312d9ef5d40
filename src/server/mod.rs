// file: src/server/mod.rs
// version: 1.0.0
// guid: c06e3d98-1a4f-4b27-8d59-7e2f0a6b1c84

//! Registration service: token-gated key distribution and slave
//! self-registration over HTTP

pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod registration;

pub use error::ApiError;
pub use registration::{ConnectRequest, Registered, Registrar, SlaveRegistration};

use crate::config::Settings;
use crate::security::{KeyPair, RegistrationToken};
use crate::{KangarooError, Result};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};

/// Shared state, initialized once at startup
#[derive(Clone)]
pub struct AppState {
    pub token: Arc<RegistrationToken>,
    pub keys: Arc<KeyPair>,
    pub registrar: Arc<Registrar>,
    /// Port slaves call back on
    pub master_port: u16,
    /// Used in the bootstrap script when a request has no Host header
    pub fallback_address: String,
}

impl AppState {
    pub fn new(settings: &Settings, token: RegistrationToken) -> Self {
        Self {
            token: Arc::new(token),
            keys: Arc::new(KeyPair::new(&settings.paths.key_path)),
            registrar: Arc::new(Registrar::new(settings)),
            master_port: settings.service.port,
            fallback_address: settings
                .service
                .advertised_address
                .clone()
                .unwrap_or_else(|| settings.service.bind_address.clone()),
        }
    }
}

/// Routes plus tracing and timeout middleware
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout));

    Router::new()
        .route("/key", get(handlers::get_key))
        .route("/download", get(handlers::download))
        .route("/connect", post(handlers::connect))
        .layer(middleware)
        .with_state(state)
}

pub struct Server {
    bind: String,
    app: Router,
}

impl Server {
    pub fn new(settings: &Settings, token: RegistrationToken) -> Self {
        let state = AppState::new(settings, token);
        Self {
            bind: format!("{}:{}", settings.service.bind_address, settings.service.port),
            app: build_router(state, settings.service.request_timeout()),
        }
    }

    pub async fn run(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.bind)
            .await
            .map_err(|e| KangarooError::network(format!("Failed to bind to {}: {}", self.bind, e)))?;

        info!("Registration service listening on {}", self.bind);

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| KangarooError::network(format!("Server error: {}", e)))?;

        info!("Registration service stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => warn!("Received Ctrl+C, shutting down"),
        _ = terminate => warn!("Received terminate signal, shutting down"),
    }
}
