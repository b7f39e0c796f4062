//! Signed upload broker: sign, then upload. Two sequential calls, no retries.

use async_trait::async_trait;
use biolink_core::{ImagePayload, UploadError, UploadedAsset};

use crate::keys::DestinationFolder;
use crate::provider::ProviderUploader;
use crate::signer::SigningClient;
use crate::traits::UploadBroker;

/// HTTP upload broker backed by a first-party signing endpoint and the provider's
/// public upload API.
#[derive(Clone, Debug)]
pub struct SignedUploadBroker {
    signer: SigningClient,
    uploader: ProviderUploader,
}

impl SignedUploadBroker {
    pub fn new(signer: SigningClient, uploader: ProviderUploader) -> Self {
        Self { signer, uploader }
    }
}

#[async_trait]
impl UploadBroker for SignedUploadBroker {
    #[tracing::instrument(
        skip(self, payload),
        fields(
            destination = %destination,
            size_bytes = payload.len(),
            content_type = %payload.content_type
        )
    )]
    async fn upload(
        &self,
        payload: &ImagePayload,
        destination: &DestinationFolder,
    ) -> Result<UploadedAsset, UploadError> {
        // A fresh grant per call; a failed sign never reaches the provider.
        let grant = self.signer.request_grant(destination).await?;
        self.uploader
            .upload_with_grant(grant, payload, destination)
            .await
    }

    fn provider_name(&self) -> &'static str {
        "cloudinary"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biolink_core::UploadStage;
    use bytes::Bytes;
    use reqwest::Client;

    const GRANT_BODY: &str =
        r#"{"cloudName":"demo","apiKey":"key-1","timestamp":1700000000,"signature":"sig-1"}"#;
    const ASSET_BODY: &str = r#"{"public_id":"avatars/u1/img1","secure_url":"https://res.example.com/demo/image/upload/v1/avatars/u1/img1.png"}"#;

    fn broker(server: &mockito::ServerGuard) -> SignedUploadBroker {
        let client = Client::new();
        SignedUploadBroker::new(
            SigningClient::new(client.clone(), format!("{}/api/sign", server.url()), None),
            ProviderUploader::new(client, format!("{}/v1_1", server.url())),
        )
    }

    fn payload() -> ImagePayload {
        ImagePayload {
            bytes: Bytes::from_static(b"PNGDATA"),
            content_type: "image/png".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sign_failure_skips_upload() {
        let mut server = mockito::Server::new_async().await;
        let sign = server
            .mock("POST", "/api/sign")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;
        let upload = server
            .mock("POST", "/v1_1/demo/image/upload")
            .expect(0)
            .create_async()
            .await;

        let destination = DestinationFolder::new("avatars", "u1").unwrap();
        let err = broker(&server)
            .upload(&payload(), &destination)
            .await
            .unwrap_err();

        assert_eq!(err.stage(), UploadStage::Sign);
        sign.assert_async().await;
        upload.assert_async().await;
    }

    #[tokio::test]
    async fn test_every_upload_requests_a_fresh_grant() {
        let mut server = mockito::Server::new_async().await;
        let sign = server
            .mock("POST", "/api/sign")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(GRANT_BODY)
            .expect(2)
            .create_async()
            .await;
        let upload = server
            .mock("POST", "/v1_1/demo/image/upload")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(ASSET_BODY)
            .expect(2)
            .create_async()
            .await;

        let broker = broker(&server);
        let destination = DestinationFolder::new("avatars", "u1").unwrap();
        broker.upload(&payload(), &destination).await.unwrap();
        broker.upload(&payload(), &destination).await.unwrap();

        sign.assert_async().await;
        upload.assert_async().await;
    }
}
