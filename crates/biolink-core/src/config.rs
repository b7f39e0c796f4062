//! Configuration module
//!
//! Process-level wiring for the ingestion pipeline: where the signing endpoint and the
//! storage provider live, how the fetcher identifies itself, and which hardening
//! switches are on. Per-call thresholds are not read from here by the pipeline; they
//! travel on each `IngestionRequest`. `RequestDefaults` only helps callers build one.

use std::env;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::time::Duration;

use crate::models::{
    IngestionRequest, DEFAULT_DESTINATION_FOLDER, DEFAULT_FETCH_TIMEOUT_MS,
    DEFAULT_MAX_PAYLOAD_BYTES, DEFAULT_THUMBNAIL_SIZES,
};

// Common constants
pub const DEFAULT_UPLOAD_API_BASE: &str = "https://api.cloudinary.com/v1_1";
pub const DEFAULT_FETCH_USER_AGENT: &str = "Mozilla/5.0 (compatible; ImageFetcher/1.0)";
pub const UPLOAD_TIMEOUT_SECS: u64 = 30;
pub const FETCH_MAX_REDIRECTS: usize = 3;

/// Credential presented to the first-party signing endpoint.
#[derive(Clone)]
pub enum SignerAuth {
    /// `Authorization: Bearer {token}`
    Bearer(String),
    /// `X-API-Key: {key}`
    XApiKey(String),
}

impl Debug for SignerAuth {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SignerAuth::Bearer(_) => write!(f, "Bearer([redacted])"),
            SignerAuth::XApiKey(_) => write!(f, "XApiKey([redacted])"),
        }
    }
}

/// Caller-side defaults used to build an `IngestionRequest`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestDefaults {
    pub destination_folder: String,
    pub max_payload_bytes: u64,
    pub fetch_timeout_millis: u64,
    pub thumbnail_sizes: Vec<u32>,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            destination_folder: DEFAULT_DESTINATION_FOLDER.to_string(),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            fetch_timeout_millis: DEFAULT_FETCH_TIMEOUT_MS,
            thumbnail_sizes: DEFAULT_THUMBNAIL_SIZES.to_vec(),
        }
    }
}

impl RequestDefaults {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let defaults = Self::default();
        let thumbnail_sizes = match env::var("INGEST_THUMBNAIL_SIZES") {
            Ok(raw) => parse_sizes(&raw)?,
            Err(_) => defaults.thumbnail_sizes,
        };

        Ok(Self {
            destination_folder: env::var("INGEST_DEFAULT_FOLDER")
                .unwrap_or(defaults.destination_folder),
            max_payload_bytes: parse_number_env(
                "INGEST_MAX_PAYLOAD_BYTES",
                env::var("INGEST_MAX_PAYLOAD_BYTES").ok(),
                DEFAULT_MAX_PAYLOAD_BYTES,
            )?,
            fetch_timeout_millis: parse_number_env(
                "INGEST_FETCH_TIMEOUT_MS",
                env::var("INGEST_FETCH_TIMEOUT_MS").ok(),
                DEFAULT_FETCH_TIMEOUT_MS,
            )?,
            thumbnail_sizes,
        })
    }

    /// Build a request for one call, applying these defaults.
    pub fn build_request(
        &self,
        requesting_user_id: impl Into<String>,
        source_url: impl Into<String>,
    ) -> IngestionRequest {
        IngestionRequest::new(requesting_user_id, source_url)
            .with_destination_folder(self.destination_folder.clone())
            .with_max_payload_bytes(self.max_payload_bytes)
            .with_fetch_timeout_millis(self.fetch_timeout_millis)
            .with_thumbnail_sizes(self.thumbnail_sizes.iter().copied())
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.destination_folder.trim().is_empty() {
            return Err(anyhow::anyhow!("INGEST_DEFAULT_FOLDER must not be empty"));
        }
        if self.max_payload_bytes == 0 {
            return Err(anyhow::anyhow!("INGEST_MAX_PAYLOAD_BYTES must be greater than 0"));
        }
        if self.fetch_timeout_millis == 0 {
            return Err(anyhow::anyhow!("INGEST_FETCH_TIMEOUT_MS must be greater than 0"));
        }
        Ok(())
    }
}

/// Parse a comma-separated list of pixel sizes (e.g. "1024,256").
pub fn parse_sizes(raw: &str) -> Result<Vec<u32>, anyhow::Error> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u32>()
                .map_err(|_| anyhow::anyhow!("Invalid thumbnail size: {}", s))
        })
        .collect()
}

/// Pipeline wiring configuration
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// First-party endpoint that issues signed upload grants
    pub sign_endpoint_url: String,
    pub signer_auth: Option<SignerAuth>,
    /// Provider base; the upload URL is `{base}/{cloud_name}/image/upload`
    pub upload_api_base: String,
    /// Timeout for the sign and upload calls. 0 = no timeout.
    pub upload_timeout_secs: u64,
    pub fetch_user_agent: String,
    pub fetch_max_redirects: usize,
    /// Disables the private-address block. Only meant for local test rigs.
    pub allow_private_networks: bool,
    /// Resolve source hostnames and reject private resolved addresses.
    pub verify_resolved_addresses: bool,
    pub environment: String,
    pub request_defaults: RequestDefaults,
}

impl PipelineConfig {
    pub fn new(sign_endpoint_url: impl Into<String>) -> Self {
        Self {
            sign_endpoint_url: sign_endpoint_url.into(),
            signer_auth: None,
            upload_api_base: DEFAULT_UPLOAD_API_BASE.to_string(),
            upload_timeout_secs: UPLOAD_TIMEOUT_SECS,
            fetch_user_agent: DEFAULT_FETCH_USER_AGENT.to_string(),
            fetch_max_redirects: FETCH_MAX_REDIRECTS,
            allow_private_networks: false,
            verify_resolved_addresses: false,
            environment: "development".to_string(),
            request_defaults: RequestDefaults::default(),
        }
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let sign_endpoint_url = env::var("SIGN_ENDPOINT_URL")
            .map_err(|_| anyhow::anyhow!("SIGN_ENDPOINT_URL must be set"))?;

        let signer_auth = env::var("SIGN_BEARER_TOKEN")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(SignerAuth::Bearer)
            .or_else(|| {
                env::var("SIGN_API_KEY")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .map(SignerAuth::XApiKey)
            });

        let config = Self {
            sign_endpoint_url,
            signer_auth,
            upload_api_base: env::var("UPLOAD_API_BASE")
                .unwrap_or_else(|_| DEFAULT_UPLOAD_API_BASE.to_string()),
            upload_timeout_secs: parse_number_env(
                "UPLOAD_TIMEOUT_SECS",
                env::var("UPLOAD_TIMEOUT_SECS").ok(),
                UPLOAD_TIMEOUT_SECS,
            )?,
            fetch_user_agent: env::var("FETCH_USER_AGENT")
                .unwrap_or_else(|_| DEFAULT_FETCH_USER_AGENT.to_string()),
            fetch_max_redirects: parse_number_env(
                "FETCH_MAX_REDIRECTS",
                env::var("FETCH_MAX_REDIRECTS").ok(),
                FETCH_MAX_REDIRECTS,
            )?,
            allow_private_networks: parse_bool_env("ALLOW_PRIVATE_NETWORKS", false),
            verify_resolved_addresses: parse_bool_env("VERIFY_RESOLVED_ADDRESSES", false),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            request_defaults: RequestDefaults::from_env()?,
        };

        Ok(config)
    }

    /// Check if the pipeline is running in production mode
    pub fn is_production(&self) -> bool {
        let environment = self.environment.to_lowercase();
        environment == "production" || environment == "prod"
    }

    pub fn upload_timeout(&self) -> Option<Duration> {
        (self.upload_timeout_secs > 0).then(|| Duration::from_secs(self.upload_timeout_secs))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        let sign_url = reqwest::Url::parse(&self.sign_endpoint_url)
            .map_err(|e| anyhow::anyhow!("SIGN_ENDPOINT_URL is not a valid URL: {}", e))?;
        if sign_url.scheme() != "http" && sign_url.scheme() != "https" {
            return Err(anyhow::anyhow!(
                "SIGN_ENDPOINT_URL must start with http:// or https://"
            ));
        }

        let upload_url = reqwest::Url::parse(&self.upload_api_base)
            .map_err(|e| anyhow::anyhow!("UPLOAD_API_BASE is not a valid URL: {}", e))?;
        if self.is_production() && upload_url.scheme() != "https" {
            return Err(anyhow::anyhow!("UPLOAD_API_BASE must use https in production"));
        }

        if self.is_production() && self.allow_private_networks {
            return Err(anyhow::anyhow!(
                "ALLOW_PRIVATE_NETWORKS cannot be enabled in production"
            ));
        }

        if self.fetch_user_agent.trim().is_empty() {
            return Err(anyhow::anyhow!("FETCH_USER_AGENT must not be empty"));
        }

        self.request_defaults.validate()
    }
}

/// Parse a numeric variable's raw value, falling back to `default` when unset.
fn parse_number_env<T: FromStr>(
    name: &str,
    raw: Option<String>,
    default: T,
) -> Result<T, anyhow::Error> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number", name)),
        None => Ok(default),
    }
}

fn parse_bool_env(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| v.trim().to_lowercase())
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}
