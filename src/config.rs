//! Runtime configuration
//!
//! Every setting can be given as a flag or through its environment variable.
//! The values are resolved once at start-up into a [`Config`] that is passed
//! by reference into the listing client, the fetcher and the pipeline.

use crate::error::{FetchError, Result};
use crate::utils::http::RetryPolicy;
use clap::Args;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_LISTING_BASE: &str = "https://api.github.com/repos";
pub const DEFAULT_OUTPUT_DIR: &str = "images";

/// Global flags shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Base URL of the content-listing API
    #[arg(
        long,
        global = true,
        env = "QUOTE_FETCH_LISTING_BASE",
        default_value = DEFAULT_LISTING_BASE
    )]
    pub listing_base: String,

    /// Owner of the remote repository holding the images
    #[arg(long, global = true, env = "QUOTE_FETCH_OWNER")]
    pub owner: Option<String>,

    /// Name of the remote repository holding the images
    #[arg(long, global = true, env = "QUOTE_FETCH_REPO")]
    pub repo: Option<String>,

    /// Image-hosting endpoint, called as `<endpoint>?id=<identifier>`
    #[arg(long, global = true, env = "QUOTE_FETCH_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Access token for the listing API (unauthenticated when absent)
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Directory downloaded images are written under
    #[arg(
        short,
        long,
        global = true,
        env = "QUOTE_FETCH_OUTPUT",
        default_value = DEFAULT_OUTPUT_DIR
    )]
    pub output: PathBuf,

    /// Maximum number of image requests in flight
    #[arg(
        short,
        long,
        global = true,
        env = "QUOTE_FETCH_CONCURRENCY",
        default_value_t = 1,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub concurrency: u16,

    /// Per-request timeout in seconds
    #[arg(long, global = true, env = "QUOTE_FETCH_TIMEOUT", default_value_t = 30)]
    pub timeout: u64,

    /// Retries for transient network failures
    #[arg(long, global = true, env = "QUOTE_FETCH_RETRIES", default_value_t = 2)]
    pub retries: u32,
}

/// Location of and credentials for the remote listing API
#[derive(Clone)]
pub struct ListingConfig {
    pub base_url: String,
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub token: Option<String>,
}

impl ListingConfig {
    /// Owner and repository, which tree walks cannot do without
    pub fn repository(&self) -> Result<(&str, &str)> {
        match (self.owner.as_deref(), self.repo.as_deref()) {
            (Some(owner), Some(repo)) if !owner.is_empty() && !repo.is_empty() => {
                Ok((owner, repo))
            }
            _ => Err(FetchError::Config(
                "--owner and --repo (or QUOTE_FETCH_OWNER / QUOTE_FETCH_REPO) are required"
                    .to_string(),
            )),
        }
    }
}

impl fmt::Debug for ListingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListingConfig")
            .field("base_url", &self.base_url)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listing: ListingConfig,
    pub endpoint: Option<String>,
    pub output_dir: PathBuf,
    pub concurrency: usize,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Config {
    pub fn from_args(args: &ConfigArgs) -> Self {
        Self {
            listing: ListingConfig {
                base_url: args.listing_base.trim_end_matches('/').to_string(),
                owner: args.owner.clone(),
                repo: args.repo.clone(),
                token: args.token.clone().filter(|t| !t.trim().is_empty()),
            },
            endpoint: args.endpoint.clone(),
            output_dir: args.output.clone(),
            concurrency: usize::from(args.concurrency.max(1)),
            request_timeout: Duration::from_secs(args.timeout.max(1)),
            retry: RetryPolicy {
                max_retries: args.retries,
                ..RetryPolicy::default()
            },
        }
    }

    /// Image endpoint, which downloads cannot do without
    pub fn endpoint(&self) -> Result<&str> {
        self.endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                FetchError::Config("--endpoint (or QUOTE_FETCH_ENDPOINT) is required".to_string())
            })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listing: ListingConfig {
                base_url: DEFAULT_LISTING_BASE.to_string(),
                owner: None,
                repo: None,
                token: None,
            },
            endpoint: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            concurrency: 1,
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}
