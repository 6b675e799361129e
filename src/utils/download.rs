use crate::error::FetchError;
use crate::remote::ImageRecord;
use crate::utils::files::{destination_path, save_image};
use crate::utils::images::ImageSource;
use futures::stream::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::ops::AddAssign;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Saved,
    NoPayload,
    Failed,
}

/// Per-run counts of what happened to each identifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub saved: usize,
    pub no_payload: usize,
    pub failed: usize,
}

impl DownloadSummary {
    pub fn total(&self) -> usize {
        self.saved + self.no_payload + self.failed
    }

    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Saved => self.saved += 1,
            Outcome::NoPayload => self.no_payload += 1,
            Outcome::Failed => self.failed += 1,
        }
    }
}

impl AddAssign for DownloadSummary {
    fn add_assign(&mut self, other: Self) {
        self.saved += other.saved;
        self.no_payload += other.no_payload;
        self.failed += other.failed;
    }
}

/// Fetch every record and save it under `<output_dir>/<lang>/`.
///
/// At most `concurrency` requests are in flight (1 means strictly one after
/// another). Failures are logged per identifier and counted; they never stop
/// the batch.
pub async fn download_images(
    fetcher: &dyn ImageSource,
    output_dir: &Path,
    lang: &str,
    records: Vec<ImageRecord>,
    concurrency: usize,
) -> DownloadSummary {
    let concurrency = concurrency.max(1);
    println!(
        "Downloading {} images for '{}' with {} request(s) in flight",
        records.len(),
        lang,
        concurrency
    );

    let pb = ProgressBar::new(records.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }

    let outcomes: Vec<Outcome> = futures::stream::iter(records)
        .map(|record| {
            let pb = pb.clone();
            async move {
                let outcome = download_one(fetcher, output_dir, lang, &record).await;
                pb.inc(1);
                outcome
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    pb.finish_with_message("Download complete!");

    let mut summary = DownloadSummary::default();
    for outcome in outcomes {
        summary.record(outcome);
    }
    summary
}

async fn download_one(
    fetcher: &dyn ImageSource,
    output_dir: &Path,
    lang: &str,
    record: &ImageRecord,
) -> Outcome {
    let path = match destination_path(output_dir, lang, &record.relative_path, &record.id) {
        Ok(path) => path,
        Err(e) => {
            warn!("Rejected id '{}': {}", record.id, e);
            return Outcome::Failed;
        }
    };

    let bytes = match fetcher.fetch(&record.id).await {
        Ok(bytes) => bytes,
        Err(FetchError::NoPayload(_)) => {
            warn!("No image payload found for id '{}'", record.id);
            return Outcome::NoPayload;
        }
        Err(e) => {
            warn!("Failed to fetch id '{}': {}", record.id, e);
            return Outcome::Failed;
        }
    };

    match save_image(&path, &bytes).await {
        Ok(written) => {
            info!("Saved {}", written.display());
            Outcome::Saved
        }
        Err(e) => {
            warn!("Failed to save id '{}' to {}: {}", record.id, path.display(), e);
            Outcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::utils::http::{build_client, RetryPolicy};
    use crate::utils::images::ImageFetcher;
    use async_trait::async_trait;
    use httpmock::prelude::*;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Slow in-memory source recording the most requests ever in flight
    #[derive(Default)]
    struct SlowSource {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl ImageSource for SlowSource {
        async fn fetch(&self, _id: &str) -> Result<Vec<u8>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(b"img".to_vec())
        }
    }

    fn numbered(count: usize) -> Vec<ImageRecord> {
        (0..count)
            .map(|i| ImageRecord::new(format!("q{}", i), ""))
            .collect()
    }

    async fn endpoint_with(server: &MockServer) {
        server
            .mock_async(|when, then| {
                when.method(GET).path("/exec").query_param("id", "one");
                then.status(200)
                    .body(r#"<img src="data:image/png;base64,QUJD">"#);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/exec").query_param("id", "two");
                then.status(200)
                    .body(r#"<img src="data:image/jpeg;base64,WFla">"#);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/exec").query_param("id", "blank");
                then.status(200).body("<p>not found</p>");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/exec").query_param("id", "down");
                then.status(500);
            })
            .await;
    }

    fn fetcher(server: &MockServer) -> ImageFetcher {
        let client = build_client(Duration::from_secs(5)).unwrap();
        ImageFetcher::new(client, server.url("/exec"), RetryPolicy::none())
    }

    #[tokio::test]
    async fn test_every_listed_id_is_materialized() {
        let server = MockServer::start_async().await;
        endpoint_with(&server).await;
        let out = tempfile::tempdir().unwrap();

        let records = vec![
            ImageRecord::new("one", ""),
            ImageRecord::new("two", "love/deep"),
        ];
        let summary = download_images(&fetcher(&server), out.path(), "en", records, 1).await;

        assert_eq!(summary.saved, 2);
        assert_eq!(fs::read(out.path().join("en/one.jpg")).unwrap(), b"ABC");
        assert_eq!(
            fs::read(out.path().join("en/love/deep/two.jpg")).unwrap(),
            b"XYZ"
        );
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let server = MockServer::start_async().await;
        endpoint_with(&server).await;
        let out = tempfile::tempdir().unwrap();
        let fetcher = fetcher(&server);

        download_images(&fetcher, out.path(), "id", vec![ImageRecord::new("one", "")], 1).await;
        let first = fs::read(out.path().join("id/one.jpg")).unwrap();
        download_images(&fetcher, out.path(), "id", vec![ImageRecord::new("one", "")], 1).await;
        let second = fs::read(out.path().join("id/one.jpg")).unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_bad_items_do_not_stop_the_batch() {
        let server = MockServer::start_async().await;
        endpoint_with(&server).await;
        let out = tempfile::tempdir().unwrap();

        let records = vec![
            ImageRecord::new("blank", ""),
            ImageRecord::new("down", ""),
            ImageRecord::new("../escape", ""),
            ImageRecord::new("one", ""),
            ImageRecord::new("two", ""),
        ];
        let summary = download_images(&fetcher(&server), out.path(), "en", records, 2).await;

        assert_eq!(
            summary,
            DownloadSummary {
                saved: 2,
                no_payload: 1,
                failed: 2,
            }
        );
        assert!(out.path().join("en/one.jpg").exists());
        assert!(out.path().join("en/two.jpg").exists());
        assert!(!out.path().join("en/blank.jpg").exists());
        assert!(!out.path().join("escape.jpg").exists());
    }

    #[tokio::test]
    async fn test_default_cap_is_strictly_sequential() {
        let source = SlowSource::default();
        let out = tempfile::tempdir().unwrap();

        let summary = download_images(&source, out.path(), "en", numbered(5), 1).await;

        assert_eq!(summary.saved, 5);
        assert_eq!(source.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_in_flight_requests_never_exceed_cap() {
        let source = SlowSource::default();
        let out = tempfile::tempdir().unwrap();

        let summary = download_images(&source, out.path(), "en", numbered(9), 3).await;

        assert_eq!(summary.saved, 9);
        let peak = source.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak {} exceeded cap", peak);
        assert!(peak > 1);
    }

    #[tokio::test]
    async fn test_zero_cap_runs_one_at_a_time() {
        let source = SlowSource::default();
        let out = tempfile::tempdir().unwrap();

        download_images(&source, out.path(), "en", numbered(3), 0).await;

        assert_eq!(source.peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_summary_accumulates() {
        let mut total = DownloadSummary::default();
        total += DownloadSummary {
            saved: 2,
            no_payload: 1,
            failed: 0,
        };
        total += DownloadSummary {
            saved: 1,
            no_payload: 0,
            failed: 3,
        };
        assert_eq!(total.total(), 7);
        assert_eq!(total.saved, 3);
    }
}
