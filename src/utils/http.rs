use crate::error::{FetchError, Result};
use rand::Rng;
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;
use tracing::{debug, warn};

/// Get standard user agent string
pub fn get_user_agent() -> &'static str {
    concat!("QuoteFetch/", env!("CARGO_PKG_VERSION"))
}

/// Build the shared HTTP client with the configured per-request timeout
pub fn build_client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .user_agent(get_user_agent())
        .timeout(timeout)
        .build()?;
    Ok(client)
}

/// Bounded retry with exponential backoff for transient failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Never retry
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based), with up to 25% jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);
        let jitter_cap = (exp.as_millis() / 4) as u64;
        let jitter = if jitter_cap == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_cap)
        };
        exp + Duration::from_millis(jitter)
    }
}

/// Send a GET built by `build` until it succeeds or the policy gives up.
///
/// A non-2xx response is turned into [`FetchError::Status`]; only transport
/// errors, 429 and 5xx are retried.
pub async fn send_with_retry<F>(policy: &RetryPolicy, mut build: F) -> Result<Response>
where
    F: FnMut() -> RequestBuilder,
{
    let mut attempt = 0;
    loop {
        let result = match build().send().await {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) => Err(FetchError::Status {
                status: response.status().as_u16(),
                url: response.url().to_string(),
            }),
            Err(e) => Err(FetchError::Network(e)),
        };

        match result {
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                let delay = policy.backoff(attempt);
                warn!(
                    "Request failed ({}), retrying in {:?} ({}/{})",
                    e,
                    delay,
                    attempt + 1,
                    policy.max_retries
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            other => {
                if let Err(e) = &other {
                    debug!("Giving up after {} attempt(s): {}", attempt + 1, e);
                }
                return other;
            }
        }
    }
}
