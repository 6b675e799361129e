use super::{ListingSource, RemoteEntry};
use crate::config::ListingConfig;
use crate::error::{FetchError, Result};
use crate::utils::http::{send_with_retry, RetryPolicy};
use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::debug;

/// Listing client for a GitHub-style `contents` API
pub struct ContentsClient {
    client: Client,
    base: Url,
    token: Option<String>,
    retry: RetryPolicy,
}

impl ContentsClient {
    /// `base` becomes `<listing_base>/<owner>/<repo>/contents`
    pub fn new(client: Client, config: &ListingConfig, retry: RetryPolicy) -> Result<Self> {
        let (owner, repo) = config.repository()?;
        let mut base = Url::parse(&config.base_url)
            .map_err(|e| FetchError::Config(format!("Invalid listing base URL: {}", e)))?;
        base.path_segments_mut()
            .map_err(|_| {
                FetchError::Config(format!(
                    "Listing base URL cannot be a base: {}",
                    config.base_url
                ))
            })?
            .pop_if_empty()
            .extend([owner, repo, "contents"]);

        Ok(Self {
            client,
            base,
            token: config.token.clone(),
            retry,
        })
    }

    /// URL listing `path`, each segment percent-encoded
    pub fn url_for(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.extend(path.split('/').filter(|s| !s.is_empty()));
        }
        url
    }
}

#[async_trait]
impl ListingSource for ContentsClient {
    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        let url = self.url_for(path);
        debug!("Listing {}", url);

        let response = send_with_retry(&self.retry, || {
            let request = self
                .client
                .get(url.clone())
                .header("Accept", "application/vnd.github+json");
            match &self.token {
                Some(token) => request.bearer_auth(token),
                None => request,
            }
        })
        .await?;

        response
            .json::<Vec<RemoteEntry>>()
            .await
            .map_err(|e| FetchError::Parse(format!("Unexpected listing for '{}': {}", path, e)))
    }
}
