//! Biolink CLI: operator tool for the remote image ingestion pipeline.
//!
//! `ingest` needs SIGN_ENDPOINT_URL (and usually SIGN_BEARER_TOKEN or SIGN_API_KEY).
//! `check-url` and `thumbnail` work offline.

use std::collections::BTreeSet;
use std::process::ExitCode;

use anyhow::Context;
use biolink_cli::{check_url, exit_code_for, init_tracing, parse_sizes_arg, print_json};
use biolink_core::{PipelineConfig, RequestDefaults};
use biolink_ingest::IngestionPipeline;
use biolink_storage::derive_thumbnail_url;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "biolink", about = "Remote image ingestion CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch an image from a URL and store it for a user
    Ingest {
        /// Requesting user id (storage namespace)
        #[arg(long)]
        user: String,
        /// Source image URL
        #[arg(long)]
        url: String,
        /// Destination folder (default: INGEST_DEFAULT_FOLDER or "avatars")
        #[arg(long)]
        folder: Option<String>,
        /// Maximum payload size in bytes
        #[arg(long)]
        max_bytes: Option<u64>,
        /// Fetch timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Thumbnail sizes to consider, e.g. 1024,256
        #[arg(long, value_parser = parse_sizes_arg)]
        sizes: Option<BTreeSet<u32>>,
    },
    /// Report whether a URL would be refused as a private target
    CheckUrl {
        url: String,
        /// Also resolve the hostname and check every address
        #[arg(long)]
        resolve: bool,
    },
    /// Derive the thumbnail URL for a stored asset
    Thumbnail {
        canonical_url: String,
        /// Storage object id, only checked for a diagnostic log
        #[arg(long, default_value = "")]
        object_id: String,
        #[arg(long, value_parser = parse_sizes_arg, default_value = "1024,256")]
        sizes: BTreeSet<u32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest {
            user,
            url,
            folder,
            max_bytes,
            timeout_ms,
            sizes,
        } => {
            let config = PipelineConfig::from_env().context(
                "Failed to load configuration. Set SIGN_ENDPOINT_URL (and SIGN_BEARER_TOKEN or SIGN_API_KEY)",
            )?;
            config.validate()?;

            let request = build_request(
                &config.request_defaults,
                user,
                url,
                folder,
                max_bytes,
                timeout_ms,
                sizes,
            );
            let pipeline = IngestionPipeline::from_config(&config)?;
            let result = pipeline.ingest(&request).await;

            print_json(&result)?;
            Ok(ExitCode::from(exit_code_for(&result)))
        }
        Commands::CheckUrl { url, resolve } => {
            let report = check_url(&url, resolve).await;
            print_json(&report)?;
            Ok(ExitCode::from(u8::from(report.blocked)))
        }
        Commands::Thumbnail {
            canonical_url,
            object_id,
            sizes,
        } => {
            let thumbnail_url = derive_thumbnail_url(&canonical_url, &object_id, &sizes);
            print_json(&serde_json::json!({
                "canonicalUrl": canonical_url,
                "thumbnailUrl": thumbnail_url,
            }))?;
            Ok(ExitCode::from(u8::from(thumbnail_url.is_none())))
        }
    }
}

fn build_request(
    defaults: &RequestDefaults,
    user: String,
    url: String,
    folder: Option<String>,
    max_bytes: Option<u64>,
    timeout_ms: Option<u64>,
    sizes: Option<BTreeSet<u32>>,
) -> biolink_core::IngestionRequest {
    let mut request = defaults.build_request(user, url);
    if let Some(folder) = folder {
        request = request.with_destination_folder(folder);
    }
    if let Some(max_bytes) = max_bytes {
        request = request.with_max_payload_bytes(max_bytes);
    }
    if let Some(timeout_ms) = timeout_ms {
        request = request.with_fetch_timeout_millis(timeout_ms);
    }
    if let Some(sizes) = sizes {
        request = request.with_thumbnail_sizes(sizes);
    }
    request
}
