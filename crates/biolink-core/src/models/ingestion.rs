use std::collections::BTreeSet;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorMetadata, IngestionError, ReasonCode};

pub const DEFAULT_DESTINATION_FOLDER: &str = "avatars";
pub const DEFAULT_MAX_PAYLOAD_BYTES: u64 = 2 * 1024 * 1024;
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_THUMBNAIL_SIZES: [u32; 2] = [1024, 256];

/// Input of one ingestion call.
///
/// Thresholds are explicit fields with defaults applied at construction time, so each
/// stage is a function of its inputs only. The request is never mutated once built;
/// the `with_*` methods consume and return a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionRequest {
    requesting_user_id: String,
    #[serde(default)]
    source_url: String,
    #[serde(default = "default_destination_folder")]
    destination_folder: String,
    #[serde(default = "default_max_payload_bytes")]
    max_payload_bytes: u64,
    #[serde(default = "default_fetch_timeout_millis")]
    fetch_timeout_millis: u64,
    #[serde(default = "default_thumbnail_sizes")]
    thumbnail_sizes: BTreeSet<u32>,
}

fn default_destination_folder() -> String {
    DEFAULT_DESTINATION_FOLDER.to_string()
}

fn default_max_payload_bytes() -> u64 {
    DEFAULT_MAX_PAYLOAD_BYTES
}

fn default_fetch_timeout_millis() -> u64 {
    DEFAULT_FETCH_TIMEOUT_MS
}

fn default_thumbnail_sizes() -> BTreeSet<u32> {
    DEFAULT_THUMBNAIL_SIZES.into_iter().collect()
}

impl IngestionRequest {
    pub fn new(requesting_user_id: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            requesting_user_id: requesting_user_id.into(),
            source_url: source_url.into(),
            destination_folder: default_destination_folder(),
            max_payload_bytes: default_max_payload_bytes(),
            fetch_timeout_millis: default_fetch_timeout_millis(),
            thumbnail_sizes: default_thumbnail_sizes(),
        }
    }

    pub fn with_destination_folder(mut self, folder: impl Into<String>) -> Self {
        self.destination_folder = folder.into();
        self
    }

    pub fn with_max_payload_bytes(mut self, max_payload_bytes: u64) -> Self {
        self.max_payload_bytes = max_payload_bytes;
        self
    }

    pub fn with_fetch_timeout_millis(mut self, fetch_timeout_millis: u64) -> Self {
        self.fetch_timeout_millis = fetch_timeout_millis;
        self
    }

    pub fn with_thumbnail_sizes(mut self, sizes: impl IntoIterator<Item = u32>) -> Self {
        self.thumbnail_sizes = sizes.into_iter().collect();
        self
    }

    pub fn requesting_user_id(&self) -> &str {
        &self.requesting_user_id
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn destination_folder(&self) -> &str {
        &self.destination_folder
    }

    pub fn max_payload_bytes(&self) -> u64 {
        self.max_payload_bytes
    }

    pub fn fetch_timeout_millis(&self) -> u64 {
        self.fetch_timeout_millis
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_millis)
    }

    pub fn thumbnail_sizes(&self) -> &BTreeSet<u32> {
        &self.thumbnail_sizes
    }
}

/// States of the straight-line pipeline. Any failure ends the run in the stage it
/// was raised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    ValidatingUrl,
    Fetching,
    ValidatingContent,
    Uploading,
    DerivingUrls,
    Done,
}

impl Display for PipelineStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            PipelineStage::ValidatingUrl => write!(f, "validating_url"),
            PipelineStage::Fetching => write!(f, "fetching"),
            PipelineStage::ValidatingContent => write!(f, "validating_content"),
            PipelineStage::Uploading => write!(f, "uploading"),
            PipelineStage::DerivingUrls => write!(f, "deriving_urls"),
            PipelineStage::Done => write!(f, "done"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionSuccess {
    /// Provider-issued HTTPS URL of the stored original
    pub canonical_image_url: String,
    /// Face-centered thumbnail, present when 256 was among the requested sizes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub storage_object_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionFailure {
    pub reason_code: ReasonCode,
    pub message: String,
    /// HTTP status observed from the source, signing endpoint or provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    pub stage: PipelineStage,
}

impl IngestionFailure {
    pub fn from_error(err: &IngestionError, stage: PipelineStage) -> Self {
        Self {
            reason_code: err.reason_code(),
            message: err.client_message(),
            http_status: err.http_status(),
            stage,
        }
    }
}

/// All-or-nothing outcome of one ingestion call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestionResult {
    Success(IngestionSuccess),
    Failure(IngestionFailure),
}

impl IngestionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, IngestionResult::Success(_))
    }

    pub fn reason_code(&self) -> Option<ReasonCode> {
        match self {
            IngestionResult::Success(_) => None,
            IngestionResult::Failure(failure) => Some(failure.reason_code),
        }
    }

    pub fn as_success(&self) -> Option<&IngestionSuccess> {
        match self {
            IngestionResult::Success(success) => Some(success),
            IngestionResult::Failure(_) => None,
        }
    }

    pub fn as_failure(&self) -> Option<&IngestionFailure> {
        match self {
            IngestionResult::Success(_) => None,
            IngestionResult::Failure(failure) => Some(failure),
        }
    }
}
