/*!
 * Manifest retrieval over HTTP.
 *
 * The fetcher performs exactly one GET per call. It never retries; consecutive
 * failures are counted by the retry controller instead.
 */

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use log::debug;
use reqwest::{header, Client};
use std::fmt::Debug;
use std::time::Duration;

use crate::app_config::FetchConfig;
use crate::errors::FetchError;

/// Raw manifest as fetched
#[derive(Debug, Clone)]
pub struct FetchedManifest {
    /// URL the manifest was fetched from
    pub url: String,
    /// Exact response body
    pub body: Bytes,
    /// Content-Type header, if the server sent one
    pub content_type: Option<String>,
}

/// Retrieves manifest documents
#[async_trait]
pub trait ManifestFetcher: Send + Sync + Debug {
    /// Fetch the manifest at `url`
    ///
    /// # Returns
    /// * `Result<FetchedManifest, FetchError>` - The raw document or a classified failure
    async fn fetch(&self, url: &str) -> Result<FetchedManifest, FetchError>;
}

/// reqwest-backed fetcher with bounded time and size
#[derive(Debug, Clone)]
pub struct HttpManifestFetcher {
    /// HTTP client for manifest requests
    client: Client,
    /// Hard deadline for the whole request including the body
    timeout: Duration,
    /// Largest accepted body
    max_bytes: usize,
}

impl HttpManifestFetcher {
    /// Create a fetcher from the fetch configuration
    pub fn new(config: &FetchConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build manifest HTTP client: {}", e))?;

        Ok(Self {
            client,
            timeout: config.timeout(),
            max_bytes: config.max_manifest_bytes,
        })
    }

    fn classify(&self, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout(self.timeout.as_secs())
        } else if error.is_body() || error.is_decode() {
            FetchError::MalformedResponse(error.to_string())
        } else {
            FetchError::Network(error.to_string())
        }
    }

    async fn fetch_inner(&self, url: &str) -> Result<FetchedManifest, FetchError> {
        let parsed = url::Url::parse(url)
            .map_err(|e| FetchError::Network(format!("Invalid manifest URL '{}': {}", url, e)))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::Network(format!(
                "Unsupported manifest URL scheme: {}",
                parsed.scheme()
            )));
        }

        let mut response = self
            .client
            .get(parsed)
            .header(header::ACCEPT, "application/x-web-app-manifest+json, application/json")
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status_code: status.as_u16(),
            });
        }

        if let Some(length) = response.content_length() {
            if length > self.max_bytes as u64 {
                return Err(FetchError::MalformedResponse(format!(
                    "Manifest is {} bytes, limit is {}",
                    length, self.max_bytes
                )));
            }
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.classify(e))? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(FetchError::MalformedResponse(format!(
                    "Manifest exceeds {} bytes",
                    self.max_bytes
                )));
            }
            body.extend_from_slice(&chunk);
        }

        let body = body.freeze();
        ensure_json_object(&body)?;

        debug!("Fetched {} bytes from {}", body.len(), url);

        Ok(FetchedManifest {
            url: url.to_string(),
            body,
            content_type,
        })
    }
}

#[async_trait]
impl ManifestFetcher for HttpManifestFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedManifest, FetchError> {
        // The outer deadline also covers slow bodies; dropping the inner
        // future on expiry releases the connection.
        match tokio::time::timeout(self.timeout, self.fetch_inner(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.timeout.as_secs())),
        }
    }
}

/// Reject bodies that are empty or are not a JSON object
pub fn ensure_json_object(body: &[u8]) -> Result<(), FetchError> {
    let body = super::model::strip_bom(body);
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(FetchError::MalformedResponse("Manifest body is empty".to_string()));
    }

    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(_)) => Ok(()),
        Ok(_) => Err(FetchError::MalformedResponse(
            "Manifest is not a JSON object".to_string(),
        )),
        Err(e) => Err(FetchError::MalformedResponse(format!("Invalid JSON: {}", e))),
    }
}
