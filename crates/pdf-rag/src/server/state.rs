//! Application state for the RAG server

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::config::RagConfig;
use crate::service::RagService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: RagConfig,
    /// Ingestion and query pipelines
    service: RagService,
}

/// Provider health as reported by `/ready`
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Readiness {
    pub ready: bool,
    pub embedder: bool,
    pub llm: bool,
}

impl AppState {
    pub fn new(config: RagConfig, service: RagService) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, service }),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    pub fn service(&self) -> &RagService {
        &self.inner.service
    }

    /// Folder uploaded PDFs are saved to
    pub fn upload_folder(&self) -> &Path {
        &self.inner.config.server.upload_folder
    }

    /// Probe both providers; a failed probe counts as unhealthy
    pub async fn readiness(&self) -> Readiness {
        let service = self.service();
        let (embedder, llm) = tokio::join!(
            service.embedder().health_check(),
            service.llm().health_check()
        );
        let embedder = embedder.unwrap_or(false);
        let llm = llm.unwrap_or(false);
        Readiness {
            ready: embedder && llm,
            embedder,
            llm,
        }
    }
}
