//! Bounded outbound GET for source images.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use biolink_core::config::{DEFAULT_FETCH_USER_AGENT, FETCH_MAX_REDIRECTS};
use biolink_core::{is_blocked_url, FetchError, PipelineConfig};
use reqwest::dns::Resolve;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::redirect::Policy;
use reqwest::{Client, ClientBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::resolver::{find_private_resolution, PublicAddressResolver};

/// Fetcher settings taken from process configuration.
#[derive(Debug, Clone)]
pub struct FetcherOptions {
    pub user_agent: String,
    pub max_redirects: usize,
    /// Skips the per-hop private address check on redirects. Test rigs only.
    pub allow_private_networks: bool,
    /// Refuse hosts whose resolved addresses are private, checked on every connect.
    pub verify_resolved_addresses: bool,
}

impl Default for FetcherOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_FETCH_USER_AGENT.to_string(),
            max_redirects: FETCH_MAX_REDIRECTS,
            allow_private_networks: false,
            verify_resolved_addresses: false,
        }
    }
}

impl FetcherOptions {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            user_agent: config.fetch_user_agent.clone(),
            max_redirects: config.fetch_max_redirects,
            allow_private_networks: config.allow_private_networks,
            verify_resolved_addresses: config.verify_resolved_addresses,
        }
    }
}

/// Response whose status line and headers have arrived. The body has not been read.
#[derive(Debug)]
pub struct RawResponse {
    response: reqwest::Response,
}

impl RawResponse {
    pub fn status(&self) -> reqwest::StatusCode {
        self.response.status()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.response.headers()
    }

    pub fn into_inner(self) -> reqwest::Response {
        self.response
    }
}

impl From<reqwest::Response> for RawResponse {
    fn from(response: reqwest::Response) -> Self {
        Self { response }
    }
}

/// Issues a single GET per call with a static, non-identifying header set.
#[derive(Clone, Debug)]
pub struct BoundedFetcher {
    client: Client,
}

impl BoundedFetcher {
    pub fn new(options: &FetcherOptions) -> anyhow::Result<Self> {
        let builder = client_builder(options);
        let builder = if guards_resolution(options) {
            builder.dns_resolver(Arc::new(PublicAddressResolver::system()))
        } else {
            builder
        };
        Self::build(builder)
    }

    /// Like [`new`](Self::new), resolving hostnames through `resolver`. When
    /// resolved-address verification is on, its answers are still checked.
    pub fn with_resolver<R: Resolve + 'static>(
        options: &FetcherOptions,
        resolver: Arc<R>,
    ) -> anyhow::Result<Self> {
        let builder = client_builder(options);
        let builder = if guards_resolution(options) {
            builder.dns_resolver(Arc::new(PublicAddressResolver::new(resolver)))
        } else {
            builder.dns_resolver(resolver)
        };
        Self::build(builder)
    }

    fn build(builder: ClientBuilder) -> anyhow::Result<Self> {
        let client = builder
            .build()
            .context("Failed to create HTTP client for fetching")?;
        Ok(Self { client })
    }

    /// GET `url`, giving up when `timeout` elapses or `cancel` fires before the
    /// response headers arrive. Name resolution happens inside the same deadline.
    /// Dropping the request future aborts the connection.
    pub async fn fetch(
        &self,
        url: &Url,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, FetchError> {
        let start = Instant::now();
        let request = self.client.get(url.clone()).send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(url = %url, "Fetch cancelled by caller");
                return Err(FetchError::Cancelled);
            }
            result = tokio::time::timeout(timeout, request) => match result {
                Err(_) => {
                    tracing::warn!(
                        url = %url,
                        timeout_ms = timeout.as_millis() as u64,
                        "Fetch timed out waiting for response headers"
                    );
                    return Err(FetchError::Timeout {
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
                Ok(Err(e)) => {
                    if let Some(refused) = find_private_resolution(&e) {
                        return Err(FetchError::ResolvedPrivateAddress {
                            host: refused.host.clone(),
                            address: refused.address.to_string(),
                        });
                    }
                    tracing::warn!(url = %url, error = %e, "Fetch failed");
                    return Err(FetchError::Network {
                        detail: describe_error(&e),
                    });
                }
                Ok(Ok(response)) => response,
            },
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(
                url = %url,
                status = status.as_u16(),
                "Source responded with non-success status"
            );
            return Err(FetchError::HttpStatus {
                code: status.as_u16(),
            });
        }

        tracing::debug!(
            url = %url,
            final_url = %response.url(),
            status = status.as_u16(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Source responded"
        );

        Ok(RawResponse::from(response))
    }
}

fn client_builder(options: &FetcherOptions) -> ClientBuilder {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("image/*"));

    Client::builder()
        .user_agent(options.user_agent.as_str())
        .default_headers(headers)
        .redirect(redirect_policy(
            options.max_redirects,
            options.allow_private_networks,
        ))
        .pool_max_idle_per_host(0)
}

fn guards_resolution(options: &FetcherOptions) -> bool {
    options.verify_resolved_addresses && !options.allow_private_networks
}

/// Follows at most `max_redirects` hops and re-checks every hop against the private
/// address table. A refused hop surfaces as a request error before it is contacted.
fn redirect_policy(max_redirects: usize, allow_private_networks: bool) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() > max_redirects {
            return attempt.error(format!("too many redirects (limit {})", max_redirects));
        }
        if !allow_private_networks && is_blocked_url(attempt.url()) {
            let target = attempt.url().host_str().unwrap_or_default().to_string();
            return attempt.error(format!(
                "redirect to private or reserved address {} refused",
                target
            ));
        }
        attempt.follow()
    })
}

fn describe_error(err: &reqwest::Error) -> String {
    use std::error::Error;

    let mut detail = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }
    detail
}
