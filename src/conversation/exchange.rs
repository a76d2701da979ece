//! Exchange endpoint
//!
//! One request/reply round trip with the companion backend. No retries:
//! a failure is surfaced once.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ExchangeConfig;

use super::message::Message;

/// A reply from the backend
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExchangeReply {
    pub reply: String,
    #[serde(default)]
    pub messages_remaining_today: Option<u32>,
    #[serde(default)]
    pub tier: Option<String>,
}

impl ExchangeReply {
    pub fn text(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            messages_remaining_today: None,
            tier: None,
        }
    }
}

/// Errors from the exchange endpoint
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("not authorized: {0}")]
    Auth(String),

    #[error("backend returned HTTP {status}")]
    Http { status: u16 },

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed reply: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn is_auth(&self) -> bool {
        matches!(self, BackendError::Auth(_))
    }
}

/// The backend exchange call
#[async_trait]
pub trait Exchange: Send + Sync {
    async fn exchange(&self, input: &str, history: &[Message]) -> Result<ExchangeReply, BackendError>;
}

#[derive(Serialize)]
struct InteractRequest<'a> {
    input: &'a str,
    history: &'a [Message],
}

/// Exchange over HTTP: `POST {base}/nex/interact`
pub struct HttpExchange {
    base_url: String,
    auth_token: Option<String>,
    client: reqwest::Client,
}

impl HttpExchange {
    pub fn new(config: &ExchangeConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| BackendError::Network(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/nex/interact", self.base_url)
    }
}

#[async_trait]
impl Exchange for HttpExchange {
    async fn exchange(&self, input: &str, history: &[Message]) -> Result<ExchangeReply, BackendError> {
        let mut request = self
            .client
            .post(self.endpoint())
            .json(&InteractRequest { input, history });
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        debug!(history = history.len(), "exchange request");
        let response = request
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            warn!(%status, "exchange rejected credentials");
            return Err(BackendError::Auth(status.to_string()));
        }
        if !status.is_success() {
            warn!(%status, "exchange failed");
            return Err(BackendError::Http {
                status: status.as_u16(),
            });
        }

        response
            .json::<ExchangeReply>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }
}
