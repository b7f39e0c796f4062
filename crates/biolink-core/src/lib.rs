//! Biolink Core Library
//!
//! This crate provides the domain models, error types, configuration, and URL safety
//! validation shared by the remote image ingestion pipeline and its callers.

pub mod config;
pub mod error;
pub mod models;
pub mod validation;

// Re-export commonly used types
pub use config::{PipelineConfig, RequestDefaults, SignerAuth};
pub use error::{
    ErrorMetadata, FetchError, IngestionError, LogLevel, ReasonCode, UploadError, UploadStage,
    ValidationError,
};
pub use models::{
    ImagePayload, IngestionFailure, IngestionRequest, IngestionResult, IngestionSuccess, PipelineStage,
    SignedUploadGrant, UploadedAsset,
};
pub use validation::{
    is_blocked_source_url, is_blocked_url, is_private_ip, verify_resolved_addresses,
};
