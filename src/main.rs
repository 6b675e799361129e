use clap::{Parser, Subcommand};
use reqwest::Client;
use std::path::PathBuf;
use tracing::{error, info};

mod arrange;
mod config;
mod error;
mod remote;
mod utils;

use config::{Config, ConfigArgs};
use error::Result;
use remote::{sort_and_dedup, walk, ContentsClient, ImageRecord};
use utils::download::{download_images, DownloadSummary};
use utils::files::{read_ids, validate_segment, write_ids, LanguageList};
use utils::http::build_client;
use utils::images::ImageFetcher;

/// Download quote images from a remote tree or per-language ID lists
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Walk a remote directory tree and download every image in it
    Walk {
        /// Remote path to start from, e.g. quotes/en
        #[arg(short, long)]
        root: String,

        /// Language folder the images are saved under
        #[arg(short, long, value_parser = parse_lang)]
        lang: String,

        /// Sort by id and drop duplicate ids before downloading
        #[arg(long, default_value_t = false)]
        sort: bool,
    },
    /// Download the images named in per-language ID list files
    Fetch {
        /// ID list for one language, may be repeated
        #[arg(short, long = "list", value_name = "LANG=FILE", required = true)]
        lists: Vec<LanguageList>,
    },
    /// Walk a remote tree and write its sorted, de-duplicated ids to a list file
    Index {
        /// Remote path to start from, e.g. quotes/en
        #[arg(short, long)]
        root: String,

        /// File the id list is written to
        #[arg(long)]
        out: PathBuf,
    },
    /// Move flat <base>/<id>.jpg files into per-language folders
    Arrange {
        /// Directory holding the flat files (defaults to the output directory)
        #[arg(short, long)]
        base: Option<PathBuf>,

        /// ID list for one language, may be repeated
        #[arg(short, long = "list", value_name = "LANG=FILE", required = true)]
        lists: Vec<LanguageList>,
    },
}

fn parse_lang(s: &str) -> std::result::Result<String, String> {
    validate_segment(s)
        .map(str::to_string)
        .map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::from_args(&args.config);

    if let Err(e) = run(args.command, &config).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Walk { root, lang, sort } => {
            let client = build_client(config.request_timeout)?;
            let fetcher = ImageFetcher::new(client.clone(), config.endpoint()?, config.retry);

            let records = walk_tree(config, client, &root).await?;
            let records = if sort {
                sort_and_dedup(records)
            } else {
                records
            };
            println!("Found {} images under {}", records.len(), root);

            let summary =
                download_images(&fetcher, &config.output_dir, &lang, records, config.concurrency)
                    .await;
            report(&summary);
        }
        Commands::Fetch { lists } => {
            let client = build_client(config.request_timeout)?;
            let fetcher = ImageFetcher::new(client, config.endpoint()?, config.retry);

            let mut total = DownloadSummary::default();
            for list in lists {
                let ids = read_ids(&list.path);
                info!(
                    "Read {} ids for '{}' from {}",
                    ids.len(),
                    list.lang,
                    list.path.display()
                );
                let records: Vec<ImageRecord> =
                    ids.into_iter().map(|id| ImageRecord::new(id, "")).collect();
                total += download_images(
                    &fetcher,
                    &config.output_dir,
                    &list.lang,
                    records,
                    config.concurrency,
                )
                .await;
            }
            report(&total);
        }
        Commands::Index { root, out } => {
            let client = build_client(config.request_timeout)?;
            let records = sort_and_dedup(walk_tree(config, client, &root).await?);
            let ids: Vec<String> = records.into_iter().map(|record| record.id).collect();

            write_ids(&out, &ids)?;
            println!("Wrote {} ids to {}", ids.len(), out.display());
        }
        Commands::Arrange { base, lists } => {
            let base = base.unwrap_or_else(|| config.output_dir.clone());
            for list in lists {
                let ids = read_ids(&list.path);
                let summary = arrange::arrange(&base, &list.lang, &ids);
                println!(
                    "{}: moved {}, skipped {} (not found), failed {}",
                    list.lang, summary.moved, summary.skipped, summary.failed
                );
            }
        }
    }

    Ok(())
}

async fn walk_tree(config: &Config, client: Client, root: &str) -> Result<Vec<ImageRecord>> {
    let contents = ContentsClient::new(client, &config.listing, config.retry)?;
    if config.listing.token.is_none() {
        info!("No access token configured, listing calls are unauthenticated");
    }
    Ok(walk(&contents, root).await)
}

fn report(summary: &DownloadSummary) {
    println!();
    println!("Saved {} of {} images", summary.saved, summary.total());
    if summary.no_payload > 0 {
        println!("Skipped {} images (no embedded payload)", summary.no_payload);
    }
    if summary.failed > 0 {
        eprintln!("Warning: {} downloads failed", summary.failed);
    }
}
