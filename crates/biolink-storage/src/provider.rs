//! Multipart upload to the storage provider's public upload endpoint.

use std::time::Instant;

use biolink_core::{ImagePayload, SignedUploadGrant, UploadError, UploadStage, UploadedAsset};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

use crate::keys::DestinationFolder;
use crate::signer::truncate;
use crate::transform::CANONICAL_TRANSFORMATION;

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: ProviderErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorMessage {
    message: String,
}

/// Uploads payloads to `{api_base}/{cloud_name}/image/upload`.
#[derive(Clone, Debug)]
pub struct ProviderUploader {
    client: Client,
    api_base: String,
}

impl ProviderUploader {
    pub fn new(client: Client, api_base: String) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn upload_url(&self, cloud_name: &str) -> String {
        format!(
            "{}/{}/image/upload",
            self.api_base,
            urlencoding::encode(cloud_name)
        )
    }

    /// Relay the payload using `grant`. The grant is consumed: one grant, one upload.
    pub async fn upload_with_grant(
        &self,
        grant: SignedUploadGrant,
        payload: &ImagePayload,
        destination: &DestinationFolder,
    ) -> Result<UploadedAsset, UploadError> {
        let start = Instant::now();
        let url = self.upload_url(&grant.cloud_name);
        let form = build_form(grant, payload, destination)?;

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    destination = %destination,
                    size_bytes = payload.len(),
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Provider upload request failed"
                );
                UploadError::Transport {
                    stage: UploadStage::Upload,
                    detail: e.to_string(),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let provider_message = serde_json::from_str::<ProviderErrorBody>(&error_text)
                .map(|body| body.error.message)
                .unwrap_or_else(|_| truncate(&error_text, 256).to_string());
            tracing::error!(
                status = status.as_u16(),
                provider_message = %provider_message,
                destination = %destination,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Provider rejected upload"
            );
            return Err(UploadError::Status {
                stage: UploadStage::Upload,
                code: status.as_u16(),
            });
        }

        let asset: UploadedAsset =
            response
                .json()
                .await
                .map_err(|e| UploadError::MalformedResponse {
                    stage: UploadStage::Upload,
                    detail: e.to_string(),
                })?;

        if asset.storage_object_id.is_empty() || asset.canonical_url.is_empty() {
            return Err(UploadError::MalformedResponse {
                stage: UploadStage::Upload,
                detail: "response is missing public_id or secure_url".to_string(),
            });
        }

        tracing::info!(
            storage_object_id = %asset.storage_object_id,
            destination = %destination,
            size_bytes = payload.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Provider upload successful"
        );

        Ok(asset)
    }
}

fn build_form(
    grant: SignedUploadGrant,
    payload: &ImagePayload,
    destination: &DestinationFolder,
) -> Result<Form, UploadError> {
    let file = Part::bytes(payload.bytes.to_vec())
        .file_name("upload")
        .mime_str(&payload.content_type)
        .map_err(|e| UploadError::Transport {
            stage: UploadStage::Upload,
            detail: format!("invalid payload content type: {}", e),
        })?;

    let mut form = Form::new()
        .part("file", file)
        .text("api_key", grant.api_key)
        .text("timestamp", grant.issued_at_timestamp.to_string())
        .text("signature", grant.signature)
        .text("folder", destination.as_str().to_string())
        .text("transformation", CANONICAL_TRANSFORMATION);

    if let Some(preset) = grant.upload_preset_name {
        form = form.text("upload_preset", preset);
    }

    Ok(form)
}
