//! Upload broker construction from process configuration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use biolink_core::PipelineConfig;
use reqwest::Client;

use crate::{ProviderUploader, SignedUploadBroker, SigningClient, UploadBroker};

/// Build the HTTP client shared by the signer and the uploader.
///
/// No idle connections are pooled, so nothing outlives a single upload.
pub fn build_upload_client(timeout: Option<Duration>) -> anyhow::Result<Client> {
    let mut builder = Client::builder().pool_max_idle_per_host(0);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .context("Failed to create HTTP client for uploads")
}

/// Create the upload broker described by configuration
pub fn create_upload_broker(config: &PipelineConfig) -> anyhow::Result<Arc<dyn UploadBroker>> {
    let client = build_upload_client(config.upload_timeout())?;

    let signer = SigningClient::new(
        client.clone(),
        config.sign_endpoint_url.clone(),
        config.signer_auth.clone(),
    );
    let uploader = ProviderUploader::new(client, config.upload_api_base.clone());

    tracing::debug!(
        sign_endpoint = %signer.endpoint(),
        upload_api_base = %config.upload_api_base,
        upload_timeout_secs = config.upload_timeout_secs,
        "Upload broker configured"
    );

    Ok(Arc::new(SignedUploadBroker::new(signer, uploader)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_upload_broker_from_config() {
        let config = PipelineConfig::new("https://app.example.com/api/sign-upload");
        let broker = create_upload_broker(&config).unwrap();
        assert_eq!(broker.provider_name(), "cloudinary");
    }
}
