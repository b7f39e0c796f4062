//! Upload broker abstraction trait
//!
//! The ingestion pipeline only depends on this trait, so the HTTP broker can be swapped
//! for another provider or a test double.

use async_trait::async_trait;
use biolink_core::{ImagePayload, UploadError, UploadedAsset};

use crate::keys::DestinationFolder;

#[async_trait]
pub trait UploadBroker: Send + Sync {
    /// Store a validated payload under `destination` and return the provider's asset.
    ///
    /// Implementations must obtain a fresh credential for every call and must not
    /// attempt the upload when obtaining that credential failed. Nothing is retried.
    async fn upload(
        &self,
        payload: &ImagePayload,
        destination: &DestinationFolder,
    ) -> Result<UploadedAsset, UploadError>;

    /// Short provider label for logs
    fn provider_name(&self) -> &'static str;
}
