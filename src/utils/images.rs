use crate::error::{FetchError, Result};
use crate::utils::http::{send_with_retry, RetryPolicy};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::Regex;
use reqwest::Client;
use std::sync::LazyLock;

/// `src="data:image/<subtype>;base64,<payload>"`; the subtype is not used
static DATA_URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"src\s*=\s*"data:image/[A-Za-z0-9.+-]+;base64,([^"]+)""#)
        .expect("Invalid data URI regex")
});

/// Base64 payload of the first embedded image in `body`
pub fn extract_payload(body: &str) -> Option<&str> {
    DATA_URI
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Decode a payload, ignoring any whitespace wrapped into it.
/// The bytes are not checked to be a valid image.
pub fn decode_payload(payload: &str) -> Result<Vec<u8>> {
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(STANDARD.decode(compact)?)
}

/// Something that turns an identifier into decoded image bytes
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, id: &str) -> Result<Vec<u8>>;
}

/// Looks identifiers up on the image-hosting endpoint
pub struct ImageFetcher {
    client: Client,
    endpoint: String,
    retry: RetryPolicy,
}

impl ImageFetcher {
    pub fn new(client: Client, endpoint: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            retry,
        }
    }
}

#[async_trait]
impl ImageSource for ImageFetcher {
    /// Fetch and decode the image for `id`.
    ///
    /// A response without an embedded payload is [`FetchError::NoPayload`].
    async fn fetch(&self, id: &str) -> Result<Vec<u8>> {
        let response = send_with_retry(&self.retry, || {
            self.client.get(&self.endpoint).query(&[("id", id)])
        })
        .await?;
        let body = response.text().await?;

        let payload =
            extract_payload(&body).ok_or_else(|| FetchError::NoPayload(id.to_string()))?;
        decode_payload(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::time::Duration;

    fn fetcher(endpoint: String) -> ImageFetcher {
        let client = crate::utils::http::build_client(Duration::from_secs(5)).unwrap();
        ImageFetcher::new(client, endpoint, RetryPolicy::none())
    }

    #[test]
    fn test_extract_and_decode() {
        let body = r#"<div><img alt="q" src="data:image/png;base64,QUJD" width="10"></div>"#;
        let payload = extract_payload(body).unwrap();
        assert_eq!(payload, "QUJD");
        assert_eq!(decode_payload(payload).unwrap(), b"ABC");
    }

    #[test]
    fn test_first_payload_wins() {
        let body = concat!(
            r#"<img src="data:image/jpeg;base64,QUJD">"#,
            r#"<img src="data:image/jpeg;base64,WFla">"#,
        );
        assert_eq!(extract_payload(body), Some("QUJD"));
    }

    #[test]
    fn test_no_payload() {
        assert_eq!(extract_payload("<p>Image not found</p>"), None);
        assert_eq!(extract_payload(r#"<img src="https://x/y.jpg">"#), None);
    }

    #[test]
    fn test_wrapped_payload_decodes() {
        assert_eq!(decode_payload("QU\nJD").unwrap(), b"ABC");
        assert!(matches!(decode_payload("@@@"), Err(FetchError::Decode(_))));
    }

    #[tokio::test]
    async fn test_fetch_sends_id_as_query() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/exec").query_param("id", "abc");
                then.status(200)
                    .header("content-type", "text/html")
                    .body(r#"<img src="data:image/jpeg;base64,QUJD">"#);
            })
            .await;

        let bytes = fetcher(server.url("/exec")).fetch("abc").await.unwrap();

        mock.assert_async().await;
        assert_eq!(bytes, b"ABC");
    }

    #[tokio::test]
    async fn test_fetch_without_payload_is_soft_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/exec");
                then.status(200).body("<html>nothing here</html>");
            })
            .await;

        let err = fetcher(server.url("/exec")).fetch("zzz").await.unwrap_err();
        assert!(matches!(err, FetchError::NoPayload(id) if id == "zzz"));
    }

    #[tokio::test]
    async fn test_fetch_server_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/exec");
                then.status(502);
            })
            .await;

        let err = fetcher(server.url("/exec")).fetch("abc").await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 502, .. }));
    }

    #[tokio::test]
    async fn test_fetch_recovers_after_transient_failure() {
        let server = MockServer::start_async().await;
        let mut unavailable = server
            .mock_async(|when, then| {
                when.method(GET).path("/exec").query_param("id", "abc");
                then.status(503);
            })
            .await;

        let client = crate::utils::http::build_client(Duration::from_secs(5)).unwrap();
        let retry = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(300),
            max_delay: Duration::from_secs(2),
        };
        let fetcher = ImageFetcher::new(client, server.url("/exec"), retry);
        let pending = tokio::spawn(async move { fetcher.fetch("abc").await });

        // The first attempt sees the 503; the endpoint is healthy before the retry
        tokio::time::sleep(Duration::from_millis(100)).await;
        unavailable.delete_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/exec").query_param("id", "abc");
                then.status(200)
                    .body(r#"<img src="data:image/jpeg;base64,QUJD">"#);
            })
            .await;

        let bytes = pending.await.unwrap().unwrap();
        assert_eq!(bytes, b"ABC");
    }
}
