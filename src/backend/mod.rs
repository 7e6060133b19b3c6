pub mod agent;
pub mod decoder;

pub use agent::{AgentServer, ApiError};
pub use decoder::{FrameDecoder, decode_stream};

#[cfg(test)]
use mockall::automock;

use crate::{
    config::{BackendConfig, verbose},
    models::{ChatRequest, Model, WireEvent, builtin_models},
};
use async_trait::async_trait;
use eyre::Result;
use futures::stream::BoxStream;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Backend {
    fn name(&self) -> &str;
    async fn list_models(&self) -> Result<Vec<Model>>;
    async fn health(&self) -> Result<String>;

    /// Open a chat exchange. The returned stream ends on `[DONE]`, at the end
    /// of the body or as soon as `cancel_token` is cancelled.
    async fn chat_stream(
        &self,
        request: ChatRequest,
        cancel_token: CancellationToken,
    ) -> Result<BoxStream<'static, Result<WireEvent>>>;
}

pub type ArcBackend = Arc<dyn Backend + Send + Sync>;

pub fn new_backend(config: &BackendConfig) -> ArcBackend {
    let agent = AgentServer::from(config);
    log::debug!("Using agent server at {}", agent.endpoint());
    agent.into()
}

/// Models served by the backend, or the built-in list when it cannot tell.
pub async fn fetch_models(backend: &ArcBackend) -> Vec<Model> {
    match backend.list_models().await {
        Ok(models) if !models.is_empty() => {
            verbose!("  [+] {} serves {} models", backend.name(), models.len());
            models
        }
        Ok(_) => {
            log::warn!("{} returned no models, using built-in list", backend.name());
            builtin_models()
        }
        Err(err) => {
            log::warn!(
                "Failed to list models from {}, using built-in list: {:#}",
                backend.name(),
                err
            );
            builtin_models()
        }
    }
}

/// Start-up probe; never fatal.
pub async fn check_health(backend: &ArcBackend) -> bool {
    match backend.health().await {
        Ok(status) => {
            verbose!("  [+] {} health: {}", backend.name(), status);
            log::debug!("{} health: {}", backend.name(), status);
            true
        }
        Err(err) => {
            verbose!("  [-] {} is not reachable", backend.name());
            log::warn!("Health check of {} failed: {:#}", backend.name(), err);
            false
        }
    }
}
