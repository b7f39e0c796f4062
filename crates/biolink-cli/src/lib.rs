use std::collections::BTreeSet;

use anyhow::Context;
use biolink_core::config::parse_sizes;
use biolink_core::{is_blocked_source_url, verify_resolved_addresses, IngestionResult};
use serde::Serialize;

/// Initialize tracing for the CLI. Logs go to stderr so stdout stays valid JSON.
///
/// `LOG_FORMAT=json` switches to structured JSON lines.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

pub fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

/// clap value parser for `--sizes 1024,256`.
pub fn parse_sizes_arg(raw: &str) -> Result<BTreeSet<u32>, String> {
    parse_sizes(raw)
        .map(|sizes| sizes.into_iter().collect())
        .map_err(|e| e.to_string())
}

/// Process exit status for an ingestion outcome.
pub fn exit_code_for(result: &IngestionResult) -> u8 {
    if result.is_success() {
        0
    } else {
        1
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UrlCheckReport {
    pub url: String,
    pub blocked: bool,
    /// Outcome of the DNS resolution check, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

/// Run the lexical check and, with `resolve`, the resolved-address check as well.
pub async fn check_url(url: &str, resolve: bool) -> UrlCheckReport {
    let mut report = UrlCheckReport {
        url: url.to_string(),
        blocked: is_blocked_source_url(url),
        resolution: None,
    };

    if resolve && !report.blocked {
        if let Ok(parsed) = url::Url::parse(url.trim()) {
            match verify_resolved_addresses(&parsed).await {
                Ok(()) => report.resolution = Some("ok".to_string()),
                Err(reason) => {
                    report.blocked = true;
                    report.resolution = Some(reason);
                }
            }
        }
    }

    report
}
