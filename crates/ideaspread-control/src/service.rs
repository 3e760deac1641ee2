//! Wire contract and HTTP transport for the simulation service.

use std::future::Future;
use std::sync::Arc;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::controller::PanelConfig;
use crate::params::SimulationParameters;

/// Status-field value the service uses to mark a completed run.
pub const STATUS_SUCCESS: &str = "success";

/// Raw statistics reported for a completed run.
///
/// Values are carried unformatted; percentage rendering belongs to whatever
/// displays them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    /// Share of the population holding the idea at the end of the run, 0–1.
    pub final_infection_rate: f64,
    /// Total number of agents the idea ever reached.
    pub total_infected: u64,
    /// Simulated days until spread stalled; omitted by older service builds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_days: Option<f64>,
}

/// Body of a `/simulate` response, success or failure shaped alike.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulateReply {
    pub status: String,
    /// Media path relative to the service's own origin.
    #[serde(rename = "mediaUrl", default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<RunStatistics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Errors produced while talking to the simulation service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("service returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("failed to decode simulation reply: {0}")]
    Decode(String),
}

/// Seam between the run controller and the remote engine.
///
/// Production uses [`HttpSimulationService`]; tests script replies through
/// their own implementations.
pub trait SimulationService {
    fn simulate(
        &self,
        params: SimulationParameters,
    ) -> impl Future<Output = Result<SimulateReply, ServiceError>> + Send;
}

impl<S> SimulationService for Arc<S>
where
    S: SimulationService + Send + Sync,
{
    fn simulate(
        &self,
        params: SimulationParameters,
    ) -> impl Future<Output = Result<SimulateReply, ServiceError>> + Send {
        (**self).simulate(params)
    }
}

/// `reqwest`-backed transport issuing `POST <base>/simulate`.
#[derive(Debug, Clone)]
pub struct HttpSimulationService {
    client: Client,
    base_url: String,
}

impl HttpSimulationService {
    pub fn new(config: &PanelConfig) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| ServiceError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }
}

impl SimulationService for HttpSimulationService {
    fn simulate(
        &self,
        params: SimulationParameters,
    ) -> impl Future<Output = Result<SimulateReply, ServiceError>> + Send {
        async move {
            let url = join_url(&self.base_url, "/simulate");
            debug!(%url, "issuing simulation request");
            let response = self
                .client
                .post(&url)
                .json(&params)
                .send()
                .await
                .map_err(|err| ServiceError::Transport(err.to_string()))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|err| ServiceError::Transport(err.to_string()))?;

            // Failure bodies that still follow the reply shape keep their
            // service-supplied message; anything else surfaces as a raw
            // status error. A non-2xx status is a failure regardless of the
            // body, so a success marker there is never passed through.
            match serde_json::from_str::<SimulateReply>(&body) {
                Ok(reply) if status.is_success() || reply.status != STATUS_SUCCESS => Ok(reply),
                Ok(_) => Err(ServiceError::Status { status, body }),
                Err(err) if status.is_success() => Err(ServiceError::Decode(err.to_string())),
                Err(_) => Err(ServiceError::Status { status, body }),
            }
        }
    }
}

/// Concatenate a service-relative path onto a base URL.
#[must_use]
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}
