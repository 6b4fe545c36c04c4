use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::http::{FetchError, RetryPolicy};
use crate::observability::FetchMetrics;

/// A named ticket-monitor URL. The name is what appears in logs and errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub name: String,
    pub url: String,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// POSTs JSON bodies and decodes JSON responses, retrying gateway timeouts
/// with exponential backoff.
#[derive(Debug, Clone)]
pub struct JsonFetcher {
    client: Client,
    policy: RetryPolicy,
    metrics: Arc<FetchMetrics>,
}

impl JsonFetcher {
    /// Build a fetcher whose requests are bounded by `timeout`
    pub fn new(policy: RetryPolicy, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self::with_client(client, policy))
    }

    pub fn with_client(client: Client, policy: RetryPolicy) -> Self {
        Self {
            client,
            policy,
            metrics: Arc::new(FetchMetrics::new()),
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn metrics(&self) -> &FetchMetrics {
        &self.metrics
    }

    /// Underlying client, shared with the Telegram side so both reuse one pool
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// POST `body` to `endpoint` and return the decoded JSON response
    pub async fn post_json<B>(&self, endpoint: &Endpoint, body: &B) -> Result<Value, FetchError>
    where
        B: Serialize + ?Sized,
    {
        if let Ok(rendered) = serde_json::to_string(body) {
            info!(endpoint = %endpoint.name, body = %rendered, "Sending ticket-monitor request");
        }

        let mut attempt: u32 = 0;
        loop {
            self.metrics.record_request();
            debug!(endpoint = %endpoint.name, attempt = attempt + 1, "Attempting request");

            let response = match self.client.post(&endpoint.url).json(body).send().await {
                Ok(response) => response,
                Err(source) => {
                    self.metrics.record_failure();
                    error!(endpoint = %endpoint.name, error = %source, "Request failed");
                    return Err(FetchError::Transport {
                        endpoint: endpoint.name.clone(),
                        source,
                    });
                }
            };

            let status = response.status();
            if status.is_success() {
                let payload = response.json::<Value>().await.map_err(|source| {
                    self.metrics.record_failure();
                    FetchError::Decode {
                        endpoint: endpoint.name.clone(),
                        source,
                    }
                })?;
                debug!(endpoint = %endpoint.name, response = %payload, "Received response");
                return Ok(payload);
            }

            if self.policy.should_retry(status.as_u16(), attempt) {
                let delay = self.policy.delay_for(attempt);
                warn!(
                    endpoint = %endpoint.name,
                    status = status.as_u16(),
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Gateway timeout, backing off before retry"
                );
                self.metrics.record_retry();
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            self.metrics.record_failure();
            error!(
                endpoint = %endpoint.name,
                status = status.as_u16(),
                attempts = attempt + 1,
                "Request rejected"
            );
            return Err(FetchError::Status {
                endpoint: endpoint.name.clone(),
                status: status.as_u16(),
                attempts: attempt + 1,
            });
        }
    }
}
