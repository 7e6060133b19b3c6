#[cfg(test)]
#[path = "agent_test.rs"]
mod tests;

use std::fmt::Display;
use std::sync::Arc;
use std::time;

use async_trait::async_trait;
use eyre::{Context, Result};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::backend::{ArcBackend, Backend, decoder};
use crate::config::{BackendConfig, user_agent};
use crate::models::{ChatRequest, Model, WireEvent};

/// Client of the agent server that produces the reasoning trace stream.
pub struct AgentServer {
    alias: String,
    endpoint: String,
    timeout: Option<time::Duration>,
}

#[async_trait]
impl Backend for AgentServer {
    fn name(&self) -> &str {
        &self.alias
    }

    async fn list_models(&self) -> Result<Vec<Model>> {
        let mut req = reqwest::Client::new()
            .get(format!("{}/api/models", self.endpoint))
            .header("User-Agent", user_agent());

        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }

        let res = req.send().await.wrap_err("listing models")?;
        let res = check_status(res).await?;

        let res = res
            .json::<ModelListResponse>()
            .await
            .wrap_err("parsing model list response")?;

        Ok(res.models)
    }

    async fn health(&self) -> Result<String> {
        let mut req = reqwest::Client::new()
            .get(format!("{}/health", self.endpoint))
            .header("User-Agent", user_agent());

        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }

        let res = req.send().await.wrap_err("checking health")?;
        let res = check_status(res).await?;

        let res = res
            .json::<HealthResponse>()
            .await
            .wrap_err("parsing health response")?;
        Ok(res.status)
    }

    async fn chat_stream(
        &self,
        request: ChatRequest,
        cancel_token: CancellationToken,
    ) -> Result<BoxStream<'static, Result<WireEvent>>> {
        if request.model.is_empty() {
            eyre::bail!("no model is set");
        }

        // The timeout only bounds connecting; a trace may stream for minutes.
        let mut client = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            client = client.connect_timeout(timeout);
        }
        let client = client.build().wrap_err("building http client")?;

        log::trace!("Sending chat request: {:?}", request);

        let send = client
            .post(format!("{}/api/chat/stream", self.endpoint))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .header("User-Agent", user_agent())
            .json(&request)
            .send();

        let res = tokio::select! {
            _ = cancel_token.cancelled() => eyre::bail!("chat request cancelled"),
            res = send => res.wrap_err("sending chat request")?,
        };
        let res = check_status(res).await?;

        log::debug!(
            "Chat stream opened: model={} mode={} messages={}",
            request.model,
            request.mode,
            request.messages.len()
        );

        Ok(decoder::decode_stream(res.bytes_stream(), cancel_token))
    }
}

impl From<AgentServer> for ArcBackend {
    fn from(value: AgentServer) -> Self {
        Arc::new(value)
    }
}

impl From<&BackendConfig> for AgentServer {
    fn from(value: &BackendConfig) -> Self {
        let mut agent = AgentServer::default().with_endpoint(&value.endpoint);
        if let Some(timeout) = value.timeout() {
            agent = agent.with_timeout(timeout);
        }
        agent
    }
}

impl AgentServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = alias.to_string();
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: time::Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn timeout(&self) -> Option<time::Duration> {
        self.timeout
    }
}

impl Default for AgentServer {
    fn default() -> Self {
        Self {
            alias: "Agent".to_string(),
            endpoint: crate::config::constants::DEFAULT_ENDPOINT.to_string(),
            timeout: None,
        }
    }
}

async fn check_status(res: reqwest::Response) -> Result<reqwest::Response> {
    if res.status().is_success() {
        return Ok(res);
    }

    let http_code = res.status().as_u16();
    let body = res.text().await.wrap_err("reading error response")?;
    log::error!("Error response ({}): {}", http_code, body);
    Err(ApiError::from_body(http_code, &body).into())
}

#[derive(Debug, Serialize, Deserialize)]
struct ModelListResponse {
    #[serde(default)]
    models: Vec<Model>,
}

#[derive(Debug, Serialize, Deserialize)]
struct HealthResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    detail: serde_json::Value,
}

/// A non-2xx answer from the agent server.
#[derive(Default, Error, Debug, PartialEq)]
pub struct ApiError {
    pub http_code: u16,
    pub detail: String,
}

impl ApiError {
    /// Use the `detail` of a FastAPI style error body, else the raw body.
    pub fn from_body(http_code: u16, body: &str) -> Self {
        let detail = match serde_json::from_str::<ErrorResponse>(body) {
            Ok(ErrorResponse {
                detail: serde_json::Value::String(detail),
            }) => detail,
            Ok(ErrorResponse { detail }) => detail.to_string(),
            Err(_) => body.trim().to_string(),
        };
        Self { http_code, detail }
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.detail.is_empty() {
            write!(f, "agent error ({})", self.http_code)
        } else {
            write!(f, "agent error ({}): {}", self.http_code, self.detail)
        }
    }
}
