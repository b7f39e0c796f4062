//! Client for the first-party signing endpoint.

use std::time::Instant;

use biolink_core::{SignedUploadGrant, SignerAuth, UploadError, UploadStage};
use reqwest::Client;
use serde::Serialize;

use crate::keys::DestinationFolder;

#[derive(Debug, Serialize)]
struct SignRequest<'a> {
    folder: &'a str,
}

/// Requests single-use upload grants. Holds no grant state between calls.
#[derive(Clone, Debug)]
pub struct SigningClient {
    client: Client,
    endpoint: String,
    auth: Option<SignerAuth>,
}

impl SigningClient {
    pub fn new(client: Client, endpoint: String, auth: Option<SignerAuth>) -> Self {
        Self {
            client,
            endpoint,
            auth,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Some(SignerAuth::Bearer(token)) => {
                request.header("Authorization", format!("Bearer {}", token))
            }
            Some(SignerAuth::XApiKey(key)) => request.header("X-API-Key", key.as_str()),
            None => request,
        }
    }

    /// POST `{ folder }` to the signing endpoint and parse the returned grant.
    pub async fn request_grant(
        &self,
        destination: &DestinationFolder,
    ) -> Result<SignedUploadGrant, UploadError> {
        let start = Instant::now();
        let request = self.apply_auth(self.client.post(&self.endpoint).json(&SignRequest {
            folder: destination.as_str(),
        }));

        let response = request.send().await.map_err(|e| {
            tracing::error!(
                error = %e,
                destination = %destination,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Signing request failed"
            );
            UploadError::Transport {
                stage: UploadStage::Sign,
                detail: e.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!(
                status = status.as_u16(),
                body = %truncate(&error_text, 256),
                destination = %destination,
                "Signing endpoint rejected request"
            );
            return Err(UploadError::Status {
                stage: UploadStage::Sign,
                code: status.as_u16(),
            });
        }

        let grant: SignedUploadGrant =
            response
                .json()
                .await
                .map_err(|e| UploadError::MalformedResponse {
                    stage: UploadStage::Sign,
                    detail: e.to_string(),
                })?;

        if grant.cloud_name.trim().is_empty()
            || grant.api_key.trim().is_empty()
            || grant.signature.trim().is_empty()
        {
            return Err(UploadError::MalformedResponse {
                stage: UploadStage::Sign,
                detail: "grant is missing cloudName, apiKey or signature".to_string(),
            });
        }

        tracing::debug!(
            cloud_name = %grant.cloud_name,
            issued_at = ?grant.issued_at(),
            has_preset = grant.upload_preset_name.is_some(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Obtained signed upload grant"
        );

        Ok(grant)
    }
}

pub(crate) fn truncate(s: &str, max_len: usize) -> &str {
    match s.char_indices().nth(max_len) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
