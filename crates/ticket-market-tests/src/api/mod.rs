use std::sync::Arc;

use eyre::Result;
use flume::Sender;
use serde::de::DeserializeOwned;
use thiserror::Error;
use ticket_market_core::{Config, ConfigUpdate, RequestKind};
use ticket_market_engine::{ConfigurationRecord, LogEntry, SystemStatus};
use tokio::sync::oneshot;

pub mod mock;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Error 400: {0}")]
    BadRequest(String),
    #[error("Error 500: {0}")]
    Failure(String),
}

impl ApiError {
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) | ApiError::Failure(msg) => msg,
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
enum Response {
    Error(String),
    Failure(String),
    Text(String),
    Json(String),
}

impl Response {
    fn into_text(self, rq_kind: RequestKind) -> ApiResult<String> {
        match self {
            Response::Error(msg) => Err(ApiError::BadRequest(msg)),
            Response::Failure(msg) => Err(ApiError::Failure(msg)),
            Response::Text(s) => Ok(s),
            resp => panic!("{rq_kind:?} must not be answered by {resp:?}"),
        }
    }

    fn into_json<T: DeserializeOwned>(self, rq_kind: RequestKind) -> Result<ApiResult<T>> {
        match self {
            Response::Error(msg) => Ok(Err(ApiError::BadRequest(msg))),
            Response::Failure(msg) => Ok(Err(ApiError::Failure(msg))),
            Response::Json(json) => Ok(Ok(serde_json::from_str(&json)?)),
            resp => panic!("{rq_kind:?} must not be answered by {resp:?}"),
        }
    }
}

struct RequestMsg {
    kind: RequestKind,
    payload: Option<String>,
    response_channel: oneshot::Sender<Response>,
}

/// Client side of the mock transport
pub struct Api {
    /// One channel per handler thread
    channels: Arc<Vec<Sender<RequestMsg>>>,

    my_channel: Sender<RequestMsg>,
    my_index: usize,
}

impl Api {
    fn new(channels: Vec<Sender<RequestMsg>>) -> Self {
        let my_channel = channels[0].clone();
        Self {
            channels: Arc::new(channels),
            my_channel,
            my_index: 0,
        }
    }
}

impl Clone for Api {
    fn clone(&self) -> Self {
        let my_index = (self.my_index + 1) % self.channels.len();
        Self {
            channels: self.channels.clone(),
            my_channel: self.channels[my_index].clone(),
            my_index,
        }
    }
}

impl Api {
    async fn make_request(&self, kind: RequestKind, payload: Option<String>) -> Result<Response> {
        let (sender, receiver) = oneshot::channel();
        let msg = RequestMsg {
            kind,
            payload,
            response_channel: sender,
        };
        self.my_channel.send_async(msg).await?;
        Ok(receiver.await?)
    }

    async fn text(&self, kind: RequestKind, payload: Option<String>) -> Result<ApiResult<String>> {
        Ok(self.make_request(kind, payload).await?.into_text(kind))
    }

    async fn json<T: DeserializeOwned>(&self, kind: RequestKind) -> Result<ApiResult<T>> {
        self.make_request(kind, None).await?.into_json(kind)
    }

    pub async fn configure(&self, update: &ConfigUpdate) -> Result<ApiResult<String>> {
        self.configure_raw(serde_json::to_string(update)?).await
    }

    /// Send an arbitrary body to the configuration endpoint
    pub async fn configure_raw(&self, body: impl Into<String>) -> Result<ApiResult<String>> {
        self.text(RequestKind::UpdateConfiguration, Some(body.into()))
            .await
    }

    pub async fn start(&self) -> Result<ApiResult<String>> {
        self.text(RequestKind::StartSystem, None).await
    }

    pub async fn stop(&self) -> Result<ApiResult<String>> {
        self.text(RequestKind::StopSystem, None).await
    }

    pub async fn reset(&self) -> Result<ApiResult<String>> {
        self.text(RequestKind::ResetSystem, None).await
    }

    pub async fn status(&self) -> Result<ApiResult<SystemStatus>> {
        self.json(RequestKind::SystemStatus).await
    }

    pub async fn logs(&self) -> Result<ApiResult<Vec<LogEntry>>> {
        self.json(RequestKind::SystemLogs).await
    }

    /// Returns the new vendor's id
    pub async fn start_vendor(&self) -> Result<ApiResult<String>> {
        self.text(RequestKind::StartVendor, None).await
    }

    /// Returns the new customer's id
    pub async fn start_customer(&self) -> Result<ApiResult<String>> {
        self.text(RequestKind::StartCustomer, None).await
    }

    pub async fn stop_vendors(&self) -> Result<ApiResult<String>> {
        self.text(RequestKind::StopVendors, None).await
    }

    pub async fn stop_customers(&self) -> Result<ApiResult<String>> {
        self.text(RequestKind::StopCustomers, None).await
    }

    pub async fn save_configuration(
        &self,
        config: &Config,
    ) -> Result<ApiResult<ConfigurationRecord>> {
        self.save_configuration_raw(serde_json::to_string(config)?)
            .await
    }

    /// Send an arbitrary body to the save endpoint
    pub async fn save_configuration_raw(
        &self,
        body: impl Into<String>,
    ) -> Result<ApiResult<ConfigurationRecord>> {
        let kind = RequestKind::SaveConfiguration;
        self.make_request(kind, Some(body.into()))
            .await?
            .into_json(kind)
    }

    pub async fn latest_configuration(&self) -> Result<ApiResult<Config>> {
        self.json(RequestKind::LatestConfiguration).await
    }
}
