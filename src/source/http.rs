//! HTTP dataset source.

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::{DatasetSource, FetchError};
use crate::config::SourceConfig;
use crate::models::RawRecord;

const MAX_ATTEMPTS: u32 = 2;
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Fetches facility datasets from the backend API
pub struct HttpSource {
    client: Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        url::Url::parse(&config.base_url).context("Invalid source base URL")?;

        let client = Client::builder()
            .user_agent(concat!("proxmap/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, endpoint: &str) -> String {
        if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }
}

impl DatasetSource for HttpSource {
    async fn fetch(&self, endpoint: &str) -> Result<Vec<RawRecord>, FetchError> {
        let url = self.url_for(endpoint);
        let mut attempts = 0;

        loop {
            attempts += 1;

            let response = match self.client.get(&url).send().await {
                Ok(r) => r,
                Err(e) => {
                    warn!(
                        "Request to {} failed (attempt {}/{}): {}",
                        url, attempts, MAX_ATTEMPTS, e
                    );
                    if attempts < MAX_ATTEMPTS {
                        tokio::time::sleep(RETRY_DELAY).await;
                        continue;
                    }
                    return Err(FetchError::Transport {
                        endpoint: endpoint.to_string(),
                        source: e,
                    });
                }
            };

            let status = response.status();
            if !status.is_success() {
                warn!(
                    "{} returned status {} (attempt {}/{})",
                    url, status, attempts, MAX_ATTEMPTS
                );
                if status.is_server_error() && attempts < MAX_ATTEMPTS {
                    tokio::time::sleep(RETRY_DELAY).await;
                    continue;
                }
                return Err(FetchError::Status {
                    endpoint: endpoint.to_string(),
                    status: status.as_u16(),
                });
            }

            let body = response.bytes().await.map_err(|e| FetchError::Transport {
                endpoint: endpoint.to_string(),
                source: e,
            })?;

            let records = parse_payload(endpoint, &body)?;
            debug!("Fetched {} records from {}", records.len(), url);
            return Ok(records);
        }
    }
}

/// Extract the record array from a response body.
///
/// Accepts a bare JSON array or an envelope object with a `data` array.
/// Elements that are not objects are dropped.
pub fn parse_payload(endpoint: &str, body: &[u8]) -> Result<Vec<RawRecord>, FetchError> {
    let malformed = |reason: String| FetchError::Malformed {
        endpoint: endpoint.to_string(),
        reason,
    };

    let value: Value = serde_json::from_slice(body).map_err(|e| malformed(e.to_string()))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut envelope) => match envelope.remove("data") {
            Some(Value::Array(items)) => items,
            _ => return Err(malformed("expected an array or a `data` array".to_string())),
        },
        _ => return Err(malformed("expected an array or a `data` array".to_string())),
    };

    let total = items.len();
    let records: Vec<RawRecord> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(record) => Some(record),
            _ => None,
        })
        .collect();

    if records.len() < total {
        warn!(
            "Dropped {} non-object records from {}",
            total - records.len(),
            endpoint
        );
    }

    Ok(records)
}
