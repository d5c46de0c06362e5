/// HTTP client for the backend audit log
use super::types::{ActivityRecord, LogsPayload};
use super::PrimarySource;
use crate::config::BackendConfig;
use crate::errors::{FeedError, FeedResult};
use crate::feed::LogEntry;
use crate::logger::{self, LogTag};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use url::Url;

/// reqwest client with a fixed per-request timeout
pub struct HttpClient {
    client: Client,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

        Ok(Self { client, timeout })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Build `base` + `path` without dropping a path prefix on `base`
pub fn endpoint_url(base: &str, path: &str) -> FeedResult<Url> {
    let joined = format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|e| FeedError::Config(format!("Invalid URL '{}': {}", joined, e)))
}

pub struct BackendClient {
    http: HttpClient,
    logs_url: Url,
    activity_url: Url,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> FeedResult<Self> {
        let http = HttpClient::new(Duration::from_secs(config.request_timeout_secs))
            .map_err(FeedError::Config)?;

        Ok(Self {
            http,
            logs_url: endpoint_url(&config.base_url, &config.logs_path)?,
            activity_url: endpoint_url(&config.base_url, &config.activity_path)?,
        })
    }

    pub fn logs_url(&self) -> &Url {
        &self.logs_url
    }

    pub fn activity_url(&self) -> &Url {
        &self.activity_url
    }

    async fn check_status(
        &self,
        response: reqwest::Response,
        endpoint: &str,
    ) -> FeedResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        logger::debug(LogTag::Backend, &format!("{} HTTP {}: {}", endpoint, status, body));
        Err(FeedError::HttpStatus { endpoint: endpoint.to_string(), status: status.as_u16() })
    }

    async fn get_json<T>(&self, url: &Url, endpoint: &str) -> FeedResult<T>
    where
        T: DeserializeOwned,
    {
        let start = Instant::now();
        let response = self.http.client().get(url.clone()).send().await?;
        let response = self.check_status(response, endpoint).await?;
        let body = response.bytes().await?;

        logger::verbose(
            LogTag::Backend,
            &format!("{} returned {} bytes in {}ms", endpoint, body.len(), start.elapsed().as_millis()),
        );

        serde_json::from_slice::<T>(&body)
            .map_err(|e| FeedError::InvalidResponse(format!("{}: {}", endpoint, e)))
    }
}

#[async_trait]
impl PrimarySource for BackendClient {
    async fn fetch_logs(&self) -> FeedResult<Vec<LogEntry>> {
        let payload: LogsPayload = self.get_json(&self.logs_url, "backend.logs").await?;
        if let Some(total) = payload.total() {
            logger::verbose(LogTag::Backend, &format!("Backend reports {} audit records", total));
        }
        Ok(payload.into_entries())
    }

    async fn log_activity(&self, record: &ActivityRecord) -> FeedResult<()> {
        let response = self
            .http
            .client()
            .post(self.activity_url.clone())
            .json(record)
            .send()
            .await?;
        self.check_status(response, "backend.log_activity").await?;

        logger::debug(LogTag::Backend, &format!("Recorded activity {}", record.action));
        Ok(())
    }
}
