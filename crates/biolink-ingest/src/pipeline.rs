//! Ingestion orchestrator.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use biolink_core::{
    is_blocked_url, ErrorMetadata, FetchError, IngestionError,
    IngestionFailure, IngestionRequest, IngestionResult, IngestionSuccess, LogLevel,
    PipelineConfig, PipelineStage, ReasonCode,
};
use biolink_storage::{create_upload_broker, derive_thumbnail_url, DestinationFolder, UploadBroker};
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use url::Url;
use uuid::Uuid;

use crate::fetcher::{BoundedFetcher, FetcherOptions};
use crate::gatekeeper::validate_and_collect;

/// Address checks applied before anything leaves the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    /// Disables the private address check entirely. Test rigs only.
    pub allow_private_networks: bool,
}

impl PipelineOptions {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            allow_private_networks: config.allow_private_networks,
        }
    }
}

/// Stateless between calls: every `ingest` is an independent unit of work.
#[derive(Clone)]
pub struct IngestionPipeline {
    fetcher: BoundedFetcher,
    broker: Arc<dyn UploadBroker>,
    options: PipelineOptions,
}

impl IngestionPipeline {
    pub fn new(
        fetcher: BoundedFetcher,
        broker: Arc<dyn UploadBroker>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            fetcher,
            broker,
            options,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> anyhow::Result<Self> {
        let fetcher = BoundedFetcher::new(&FetcherOptions::from_config(config))?;
        let broker = create_upload_broker(config)?;

        if config.allow_private_networks {
            tracing::warn!("Private network targets are allowed; SSRF protection is disabled");
        }

        Ok(Self::new(fetcher, broker, PipelineOptions::from_config(config)))
    }

    /// Run one ingestion. Never panics and never returns an error: every outcome is an
    /// `IngestionResult`.
    pub async fn ingest(&self, request: &IngestionRequest) -> IngestionResult {
        self.ingest_with_cancellation(request, CancellationToken::new())
            .await
    }

    /// Like [`ingest`](Self::ingest), with a token that aborts the fetch stage.
    /// Cancelling after the upload has started has no effect.
    pub async fn ingest_with_cancellation(
        &self,
        request: &IngestionRequest,
        cancel: CancellationToken,
    ) -> IngestionResult {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "ingest",
            request_id = %request_id,
            user_id = %request.requesting_user_id(),
            source_host = %source_host(request.source_url()),
            provider = self.broker.provider_name(),
        );

        async move {
            let start = Instant::now();
            let mut stage = PipelineStage::ValidatingUrl;

            let outcome = AssertUnwindSafe(self.run(request, &cancel, &mut stage))
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(success)) => {
                    tracing::info!(
                        storage_object_id = %success.storage_object_id,
                        has_thumbnail = success.thumbnail_url.is_some(),
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "Ingestion completed"
                    );
                    IngestionResult::Success(success)
                }
                Ok(Err(err)) => {
                    log_failure(&err, stage, start);
                    IngestionResult::Failure(IngestionFailure::from_error(&err, stage))
                }
                Err(panic) => {
                    let err = IngestionError::Unknown(panic_message(panic.as_ref()));
                    log_failure(&err, stage, start);
                    IngestionResult::Failure(IngestionFailure::from_error(&err, stage))
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        request: &IngestionRequest,
        cancel: &CancellationToken,
        stage: &mut PipelineStage,
    ) -> Result<IngestionSuccess, IngestionError> {
        *stage = PipelineStage::ValidatingUrl;
        let source = request.source_url().trim();
        if source.is_empty() {
            return Err(IngestionError::MissingSourceUrl);
        }

        let destination =
            DestinationFolder::new(request.destination_folder(), request.requesting_user_id())
                .map_err(IngestionError::InvalidRequest)?;
        let url = self.check_source_url(source)?;

        *stage = PipelineStage::Fetching;
        let timeout = request.fetch_timeout();
        let deadline = tokio::time::Instant::now() + timeout;
        let response = self.fetcher.fetch(&url, timeout, cancel).await?;

        *stage = PipelineStage::ValidatingContent;
        // The body shares the fetch deadline so a trickling source cannot stall the call.
        let collect = tokio::time::timeout_at(
            deadline,
            validate_and_collect(response, request.max_payload_bytes()),
        );
        let payload = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled.into()),
            collected = collect => match collected {
                Ok(payload) => payload?,
                Err(_) => {
                    return Err(FetchError::Timeout {
                        timeout_ms: request.fetch_timeout_millis(),
                    }
                    .into())
                }
            },
        };
        tracing::info!(
            size_bytes = payload.len(),
            content_type = %payload.content_type,
            "Source image fetched and validated"
        );

        *stage = PipelineStage::Uploading;
        let asset = self.broker.upload(&payload, &destination).await?;

        *stage = PipelineStage::DerivingUrls;
        let thumbnail_url = derive_thumbnail_url(
            &asset.canonical_url,
            &asset.storage_object_id,
            request.thumbnail_sizes(),
        );

        *stage = PipelineStage::Done;
        Ok(IngestionSuccess {
            canonical_image_url: asset.canonical_url,
            thumbnail_url,
            storage_object_id: asset.storage_object_id,
        })
    }

    /// Parse the source URL and refuse private targets. Fails closed. Resolved
    /// addresses are checked later, by the fetcher, when it connects.
    fn check_source_url(&self, source: &str) -> Result<Url, IngestionError> {
        let url = match Url::parse(source) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => url,
            _ => {
                tracing::warn!(source_url = %source, "Rejecting unparseable or non-HTTP source URL");
                return Err(IngestionError::BlockedPrivateAddress(
                    "URL is malformed or does not use http/https".to_string(),
                ));
            }
        };

        if self.options.allow_private_networks {
            return Ok(url);
        }

        if is_blocked_url(&url) {
            let host = url.host_str().unwrap_or_default().to_string();
            tracing::warn!(host = %host, "Rejecting source URL targeting a private address");
            return Err(IngestionError::BlockedPrivateAddress(host));
        }

        Ok(url)
    }
}

fn log_failure(err: &IngestionError, stage: PipelineStage, start: Instant) {
    let reason_code: ReasonCode = err.reason_code();
    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
    match err.log_level() {
        LogLevel::Debug => tracing::debug!(
            reason_code = %reason_code,
            stage = %stage,
            duration_ms,
            error = %err,
            "Ingestion rejected"
        ),
        LogLevel::Warn => tracing::warn!(
            reason_code = %reason_code,
            stage = %stage,
            http_status = ?err.http_status(),
            duration_ms,
            error = %err,
            "Ingestion failed"
        ),
        LogLevel::Error => tracing::error!(
            reason_code = %reason_code,
            stage = %stage,
            http_status = ?err.http_status(),
            duration_ms,
            error = %err,
            "Ingestion failed"
        ),
    }
}

fn source_host(source_url: &str) -> String {
    Url::parse(source_url.trim())
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()))
        .unwrap_or_default()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use biolink_core::{ImagePayload, UploadError, UploadedAsset};

    struct PanickingBroker;

    #[async_trait]
    impl UploadBroker for PanickingBroker {
        async fn upload(
            &self,
            _payload: &ImagePayload,
            _destination: &DestinationFolder,
        ) -> Result<UploadedAsset, UploadError> {
            panic!("provider client blew up")
        }

        fn provider_name(&self) -> &'static str {
            "panicking"
        }
    }

    fn pipeline(options: PipelineOptions) -> IngestionPipeline {
        IngestionPipeline::new(
            BoundedFetcher::new(&FetcherOptions::default()).unwrap(),
            Arc::new(PanickingBroker),
            options,
        )
    }

    #[tokio::test]
    async fn test_panic_in_stage_becomes_unknown_error() {
        let mut server = mockito::Server::new_async().await;
        let _source = server
            .mock("GET", "/a.png")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body("PNG")
            .create_async()
            .await;

        let pipeline = pipeline(PipelineOptions {
            allow_private_networks: true,
        });
        let request = IngestionRequest::new("u1", format!("{}/a.png", server.url()));
        let result = pipeline.ingest(&request).await;

        let failure = result.as_failure().unwrap();
        assert_eq!(failure.reason_code, ReasonCode::UnknownError);
        assert_eq!(failure.stage, PipelineStage::Uploading);
        assert!(!failure.message.contains("blew up"));
    }

    #[tokio::test]
    async fn test_malformed_and_non_http_urls_fail_closed() {
        let pipeline = pipeline(PipelineOptions::default());
        for source in ["not a url", "ftp://example.com/a.png", "file:///etc/passwd"] {
            let result = pipeline.ingest(&IngestionRequest::new("u1", source)).await;
            assert_eq!(
                result.reason_code(),
                Some(ReasonCode::BlockedPrivateAddress),
                "{}",
                source
            );
        }
    }

    #[tokio::test]
    async fn test_namespace_escape_is_invalid_request() {
        let pipeline = pipeline(PipelineOptions::default());
        let request = IngestionRequest::new("../admin", "https://example.com/a.png");
        let result = pipeline.ingest(&request).await;

        let failure = result.as_failure().unwrap();
        assert_eq!(failure.reason_code, ReasonCode::InvalidRequest);
        assert_eq!(failure.stage, PipelineStage::ValidatingUrl);
    }

    #[test]
    fn test_source_host_for_logging() {
        assert_eq!(source_host("https://cdn.example.com/a.png"), "cdn.example.com");
        assert_eq!(source_host("garbage"), "");
    }

    #[test]
    fn test_panic_message_extraction() {
        let boxed: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(boxed.as_ref()), "static message");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(boxed.as_ref()), "owned message");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "panic with non-string payload");
    }
}
