//! Error types module
//!
//! Every stage of the ingestion pipeline reports its own typed error. They are unified
//! under [`IngestionError`], which the pipeline converts into a structured
//! `IngestionResult::Failure` carrying a stable [`ReasonCode`]. Nothing in this module is
//! meant to cross the pipeline boundary as a panic or an opaque string.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected rejections of caller input
    Debug,
    /// Warning level - for failures caused by the remote source
    Warn,
    /// Error level - for upstream storage failures and unexpected faults
    Error,
}

/// Stable, machine-readable failure reason surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    MissingSourceUrl,
    InvalidRequest,
    BlockedPrivateAddress,
    NetworkError,
    Timeout,
    Cancelled,
    HttpStatus,
    InvalidContentType,
    TooLarge,
    SignFailed,
    UploadFailed,
    UnknownError,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::MissingSourceUrl => "missing_source_url",
            ReasonCode::InvalidRequest => "invalid_request",
            ReasonCode::BlockedPrivateAddress => "blocked_private_address",
            ReasonCode::NetworkError => "network_error",
            ReasonCode::Timeout => "timeout",
            ReasonCode::Cancelled => "cancelled",
            ReasonCode::HttpStatus => "http_status",
            ReasonCode::InvalidContentType => "invalid_content_type",
            ReasonCode::TooLarge => "too_large",
            ReasonCode::SignFailed => "sign_failed",
            ReasonCode::UploadFailed => "upload_failed",
            ReasonCode::UnknownError => "unknown_error",
        }
    }
}

impl Display for ReasonCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReasonCode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "missing_source_url" => Ok(ReasonCode::MissingSourceUrl),
            "invalid_request" => Ok(ReasonCode::InvalidRequest),
            "blocked_private_address" => Ok(ReasonCode::BlockedPrivateAddress),
            "network_error" => Ok(ReasonCode::NetworkError),
            "timeout" => Ok(ReasonCode::Timeout),
            "cancelled" => Ok(ReasonCode::Cancelled),
            "http_status" => Ok(ReasonCode::HttpStatus),
            "invalid_content_type" => Ok(ReasonCode::InvalidContentType),
            "too_large" => Ok(ReasonCode::TooLarge),
            "sign_failed" => Ok(ReasonCode::SignFailed),
            "upload_failed" => Ok(ReasonCode::UploadFailed),
            "unknown_error" => Ok(ReasonCode::UnknownError),
            _ => Err(anyhow::anyhow!("Invalid reason code: {}", s)),
        }
    }
}

/// Metadata describing how an ingestion error should be reported.
///
/// Lets the upstream caller pick a log level and a user-facing message without
/// matching on every variant itself.
pub trait ErrorMetadata {
    /// Stable reason code (e.g. `too_large`)
    fn reason_code(&self) -> ReasonCode;

    /// HTTP status observed from a remote party, when the failure carries one
    fn http_status(&self) -> Option<u16>;

    /// Whether issuing a fresh call may succeed
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the end user
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// The two network calls performed by the upload broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStage {
    /// Requesting a signed upload grant from the first-party endpoint
    Sign,
    /// Relaying the payload to the storage provider
    Upload,
}

impl Display for UploadStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            UploadStage::Sign => write!(f, "sign"),
            UploadStage::Upload => write!(f, "upload"),
        }
    }
}

/// Bounded fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Timed out after {timeout_ms} ms waiting for the source to respond")]
    Timeout { timeout_ms: u64 },

    #[error("Fetch was cancelled before the source responded")]
    Cancelled,

    #[error("Network error while fetching source: {detail}")]
    Network { detail: String },

    #[error("Source responded with HTTP status {code}")]
    HttpStatus { code: u16 },

    #[error("Host {host} resolved to private or reserved address {address}")]
    ResolvedPrivateAddress { host: String, address: String },
}

/// Content gatekeeper errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Source is not an image (content type: {})", found.as_deref().unwrap_or("missing"))]
    InvalidContentType { found: Option<String> },

    #[error("Declared size of {declared} bytes exceeds the limit of {limit} bytes")]
    DeclaredTooLarge { declared: u64, limit: u64 },

    #[error("Downloaded size of {measured} bytes exceeds the limit of {limit} bytes")]
    PayloadTooLarge { measured: u64, limit: u64 },

    #[error("Failed to read response body: {0}")]
    BodyRead(String),
}

/// Upload broker errors, tagged with the stage that failed
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("{stage} request failed with HTTP status {code}")]
    Status { stage: UploadStage, code: u16 },

    #[error("{stage} request failed: {detail}")]
    Transport { stage: UploadStage, detail: String },

    #[error("{stage} response could not be parsed: {detail}")]
    MalformedResponse { stage: UploadStage, detail: String },
}

impl UploadError {
    pub fn stage(&self) -> UploadStage {
        match self {
            UploadError::Status { stage, .. }
            | UploadError::Transport { stage, .. }
            | UploadError::MalformedResponse { stage, .. } => *stage,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    #[error("Source URL is required")]
    MissingSourceUrl,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Source URL targets a private or reserved address: {0}")]
    BlockedPrivateAddress(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for IngestionError {
    fn from(err: anyhow::Error) -> Self {
        IngestionError::Unknown(format!("{:#}", err))
    }
}

/// Static metadata for each variant: (reason_code, recoverable, suggested_action, log_level).
/// client_message stays per-variant for dynamic content.
fn ingestion_error_static_metadata(
    err: &IngestionError,
) -> (ReasonCode, bool, Option<&'static str>, LogLevel) {
    match err {
        IngestionError::MissingSourceUrl => (
            ReasonCode::MissingSourceUrl,
            false,
            Some("Provide the URL of the image to import"),
            LogLevel::Debug,
        ),
        IngestionError::InvalidRequest(_) => (
            ReasonCode::InvalidRequest,
            false,
            Some("Check the user identifier and destination folder"),
            LogLevel::Debug,
        ),
        IngestionError::BlockedPrivateAddress(_) => (
            ReasonCode::BlockedPrivateAddress,
            false,
            Some("Use a publicly reachable image URL"),
            LogLevel::Warn,
        ),
        IngestionError::Fetch(FetchError::Timeout { .. }) => (
            ReasonCode::Timeout,
            true,
            Some("Retry later or use a faster image host"),
            LogLevel::Warn,
        ),
        IngestionError::Fetch(FetchError::Cancelled) => {
            (ReasonCode::Cancelled, true, None, LogLevel::Debug)
        }
        IngestionError::Fetch(FetchError::Network { .. }) => (
            ReasonCode::NetworkError,
            true,
            Some("Check that the URL is reachable"),
            LogLevel::Warn,
        ),
        IngestionError::Fetch(FetchError::ResolvedPrivateAddress { .. }) => (
            ReasonCode::BlockedPrivateAddress,
            false,
            Some("Use a publicly reachable image URL"),
            LogLevel::Warn,
        ),
        IngestionError::Fetch(FetchError::HttpStatus { .. }) => (
            ReasonCode::HttpStatus,
            false,
            Some("Check that the URL points to an existing image"),
            LogLevel::Warn,
        ),
        IngestionError::Validation(ValidationError::InvalidContentType { .. }) => (
            ReasonCode::InvalidContentType,
            false,
            Some("Use a URL that points directly to an image file"),
            LogLevel::Debug,
        ),
        IngestionError::Validation(ValidationError::DeclaredTooLarge { .. })
        | IngestionError::Validation(ValidationError::PayloadTooLarge { .. }) => (
            ReasonCode::TooLarge,
            false,
            Some("Use a smaller image"),
            LogLevel::Debug,
        ),
        IngestionError::Validation(ValidationError::BodyRead(_)) => (
            ReasonCode::NetworkError,
            true,
            Some("Check that the URL is reachable"),
            LogLevel::Warn,
        ),
        IngestionError::Upload(e) => match e.stage() {
            UploadStage::Sign => (
                ReasonCode::SignFailed,
                true,
                Some("Retry after a short delay"),
                LogLevel::Error,
            ),
            UploadStage::Upload => (
                ReasonCode::UploadFailed,
                true,
                Some("Retry after a short delay"),
                LogLevel::Error,
            ),
        },
        IngestionError::Unknown(_) => (
            ReasonCode::UnknownError,
            true,
            Some("Contact support if this error persists"),
            LogLevel::Error,
        ),
    }
}

impl ErrorMetadata for IngestionError {
    fn reason_code(&self) -> ReasonCode {
        ingestion_error_static_metadata(self).0
    }

    fn http_status(&self) -> Option<u16> {
        match self {
            IngestionError::Fetch(FetchError::HttpStatus { code }) => Some(*code),
            IngestionError::Upload(UploadError::Status { code, .. }) => Some(*code),
            _ => None,
        }
    }

    fn is_recoverable(&self) -> bool {
        ingestion_error_static_metadata(self).1
    }

    fn suggested_action(&self) -> Option<&'static str> {
        ingestion_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        ingestion_error_static_metadata(self).3
    }

    fn client_message(&self) -> String {
        match self {
            IngestionError::Unknown(_) => "Unexpected error while importing the image".to_string(),
            IngestionError::Upload(UploadError::Transport { stage, .. })
            | IngestionError::Upload(UploadError::MalformedResponse { stage, .. }) => {
                format!("Image storage is unavailable ({} stage)", stage)
            }
            other => other.to_string(),
        }
    }
}
