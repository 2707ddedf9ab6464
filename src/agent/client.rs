use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::header::AUTHORIZATION;
use reqwest::header::ETAG;
use reqwest::header::IF_NONE_MATCH;
use reqwest::Response;
use reqwest::StatusCode;
use reqwest::Url;
use serde_json::Value;
use tracing::debug;
use tracing::error;

use crate::constants::AGENT_ID_HEADER;
use crate::Error;
use crate::NetworkError;
use crate::RegisterRequest;
use crate::Registration;
use crate::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    NotModified,
    Updated { etag: String, config: Value },
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ControllerClient: Send + Sync + 'static {
    async fn register(
        &self,
        name: &str,
        host: &str,
    ) -> Result<Registration>;

    /// One watch round-trip.
    ///
    /// # Errors
    /// `Error::InActive` / `Error::NotFound` when the controller no longer
    /// accepts `agent_id` (see [`Error::is_identity_rejected`]).
    async fn fetch_config(
        &self,
        agent_id: &str,
        etag: &str,
        poll_url: &str,
    ) -> Result<FetchOutcome>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait WorkerClient: Send + Sync + 'static {
    /// Pushes the raw document to the worker cache.
    async fn push_config(
        &self,
        config: &Value,
    ) -> Result<()>;
}

fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

fn parse_base_url(url: &str) -> Result<String> {
    Url::parse(url).map_err(|e| {
        error!("invalid url {}: {}", url, e);
        NetworkError::InvalidURL(url.to_string())
    })?;
    Ok(url.trim_end_matches('/').to_string())
}

fn bearer(secret: &str) -> String {
    format!("Bearer {secret}")
}

/// Turns an unexpected answer into the error taxonomy.
async fn status_error(response: Response) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    error!(status = status.as_u16(), body = %body.trim(), "unexpected response");

    match status {
        StatusCode::UNAUTHORIZED => Error::Unauthorized,
        StatusCode::FORBIDDEN => Error::InActive,
        StatusCode::NOT_FOUND => Error::NotFound,
        _ => NetworkError::UnexpectedStatus {
            status: status.as_u16(),
            body,
        }
        .into(),
    }
}

/// Talks to the controller with the `controller_secret`.
pub struct HttpControllerClient {
    http: reqwest::Client,
    base_url: String,
    secret: String,
}

impl HttpControllerClient {
    pub fn new(
        base_url: &str,
        secret: &str,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: parse_base_url(base_url)?,
            secret: secret.to_string(),
        })
    }
}

#[async_trait]
impl ControllerClient for HttpControllerClient {
    async fn register(
        &self,
        name: &str,
        host: &str,
    ) -> Result<Registration> {
        let response = self
            .http
            .post(format!("{}/register", self.base_url))
            .header(AUTHORIZATION, bearer(&self.secret))
            .json(&RegisterRequest {
                name: name.to_string(),
                host: host.to_string(),
            })
            .send()
            .await?;

        if response.status() != StatusCode::CREATED {
            return Err(status_error(response).await);
        }
        Ok(response.json().await?)
    }

    async fn fetch_config(
        &self,
        agent_id: &str,
        etag: &str,
        poll_url: &str,
    ) -> Result<FetchOutcome> {
        let mut request = self
            .http
            .get(format!("{}{}", self.base_url, poll_url))
            .header(AUTHORIZATION, bearer(&self.secret))
            .header(AGENT_ID_HEADER, agent_id);
        if !etag.is_empty() {
            request = request.header(IF_NONE_MATCH, etag);
        }

        let response = request.send().await?;
        match response.status() {
            StatusCode::NOT_MODIFIED => {
                debug!("data not modified");
                Ok(FetchOutcome::NotModified)
            }
            StatusCode::OK => {
                let etag = response
                    .headers()
                    .get(ETAG)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let config: Value = response.json().await?;
                Ok(FetchOutcome::Updated { etag, config })
            }
            _ => Err(status_error(response).await),
        }
    }
}

/// Pushes documents to the local worker with the `worker_secret`.
pub struct HttpWorkerClient {
    http: reqwest::Client,
    base_url: String,
    secret: String,
}

impl HttpWorkerClient {
    pub fn new(
        base_url: &str,
        secret: &str,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: parse_base_url(base_url)?,
            secret: secret.to_string(),
        })
    }
}

#[async_trait]
impl WorkerClient for HttpWorkerClient {
    async fn push_config(
        &self,
        config: &Value,
    ) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/config", self.base_url))
            .header(AUTHORIZATION, bearer(&self.secret))
            .json(config)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        Ok(())
    }
}
