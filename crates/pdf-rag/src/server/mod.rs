//! HTTP server for the RAG system

pub mod routes;
pub mod state;

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    routing::get,
    Json, Router,
};
use std::net::SocketAddr;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, CorsLayer},
    trace::TraceLayer,
};

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::service::RagService;
use state::{AppState, Readiness};

/// RAG HTTP Server
pub struct RagServer {
    config: RagConfig,
    state: AppState,
}

impl RagServer {
    /// Create a server over the configured providers and index
    pub async fn new(config: RagConfig) -> Result<Self> {
        tracing::info!("Initializing RAG service (backend: {:?})...", config.backend);
        let service = RagService::from_config(&config)?;
        Self::with_service(config, service).await
    }

    /// Create a server over an already wired service
    pub async fn with_service(config: RagConfig, service: RagService) -> Result<Self> {
        tokio::fs::create_dir_all(&config.server.upload_folder).await?;
        let state = AppState::new(config.clone(), service);
        Ok(Self { config, state })
    }

    /// Build the router with all routes
    pub fn router(&self) -> Result<Router> {
        build_router(&self.config, self.state.clone())
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let router = self.router()?;

        tracing::info!("Starting RAG server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

fn build_router(config: &RagConfig, state: AppState) -> Result<Router> {
    let origin = HeaderValue::from_str(&config.server.allowed_origin).map_err(|e| {
        Error::Config(format!(
            "Invalid allowed origin {:?}: {}",
            config.server.allowed_origin, e
        ))
    })?;

    // Credentials rule out wildcards, so methods and headers mirror the request
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request());

    Ok(Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness))
        .merge(routes::api_routes(config.server.max_upload_size))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Readiness check endpoint
async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    let readiness = state.readiness().await;
    let status = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(readiness))
}
