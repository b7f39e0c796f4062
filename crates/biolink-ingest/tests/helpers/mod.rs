pub mod fixtures;

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use biolink_core::PipelineConfig;
use biolink_ingest::{BoundedFetcher, FetcherOptions, IngestionPipeline, PipelineOptions};
use biolink_storage::create_upload_broker;
use mockito::{Mock, ServerGuard};
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub const SIGN_PATH: &str = "/api/sign-upload";
pub const UPLOAD_PATH: &str = "/v1_1/demo/image/upload";

/// One mock server playing the source host, the signing endpoint and the provider.
pub struct TestRig {
    pub server: ServerGuard,
    pub pipeline: IngestionPipeline,
}

impl TestRig {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.server.url(), path)
    }

    /// Source image served with the given content type.
    pub async fn mock_source(
        &mut self,
        path: &str,
        content_type: &str,
        body: &[u8],
        hits: usize,
    ) -> Mock {
        self.server
            .mock("GET", path)
            .with_status(200)
            .with_header("content-type", content_type)
            .with_body(body)
            .expect(hits)
            .create_async()
            .await
    }

    pub async fn mock_sign_ok(&mut self, hits: usize) -> Mock {
        self.server
            .mock("POST", SIGN_PATH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(fixtures::GRANT_BODY)
            .expect(hits)
            .create_async()
            .await
    }

    pub async fn mock_upload_ok(&mut self, public_id: &str, secure_url: &str, hits: usize) -> Mock {
        self.server
            .mock("POST", UPLOAD_PATH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(fixtures::asset_body(public_id, secure_url))
            .expect(hits)
            .create_async()
            .await
    }
}

/// Rig with private targets allowed, since the mock server listens on loopback.
pub async fn setup_rig() -> TestRig {
    setup_rig_with(|config| config.allow_private_networks = true).await
}

/// Rig with the production address checks left on.
pub async fn setup_guarded_rig() -> TestRig {
    setup_rig_with(|_| {}).await
}

pub async fn setup_rig_with(configure: impl FnOnce(&mut PipelineConfig)) -> TestRig {
    let server = mockito::Server::new_async().await;

    let mut config = PipelineConfig::new(format!("{}{}", server.url(), SIGN_PATH));
    config.upload_api_base = format!("{}/v1_1", server.url());
    configure(&mut config);

    let pipeline = IngestionPipeline::from_config(&config).expect("pipeline builds from config");
    TestRig { server, pipeline }
}

/// Fixed host table standing in for DNS.
pub struct StaticResolver(HashMap<String, IpAddr>);

impl Resolve for StaticResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let result: Result<Addrs, Box<dyn std::error::Error + Send + Sync>> =
            match self.0.get(name.as_str()) {
                Some(ip) => Ok(Box::new(std::iter::once(SocketAddr::new(*ip, 0)))),
                None => Err(format!("no address for {}", name.as_str()).into()),
            };
        Box::pin(async move { result })
    }
}

/// Rig whose fetcher resolves `host` to `ip`, so a public-looking name can point at
/// the loopback mock server.
pub async fn setup_resolving_rig(
    host: &str,
    ip: IpAddr,
    configure: impl FnOnce(&mut PipelineConfig),
) -> TestRig {
    let server = mockito::Server::new_async().await;

    let mut config = PipelineConfig::new(format!("{}{}", server.url(), SIGN_PATH));
    config.upload_api_base = format!("{}/v1_1", server.url());
    configure(&mut config);

    let resolver = Arc::new(StaticResolver(HashMap::from([(host.to_string(), ip)])));
    let fetcher = BoundedFetcher::with_resolver(&FetcherOptions::from_config(&config), resolver)
        .expect("fetcher builds");
    let broker = create_upload_broker(&config).expect("broker builds");
    let pipeline = IngestionPipeline::new(fetcher, broker, PipelineOptions::from_config(&config));
    TestRig { server, pipeline }
}

/// Raw source that sends image headers at once, then one body byte per `interval`.
pub async fn spawn_trickle_source(interval: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            if socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nContent-Length: 1000\r\n\r\n")
                .await
                .is_err()
            {
                return;
            }
            for _ in 0..1000 {
                tokio::time::sleep(interval).await;
                if socket.write_all(b"x").await.is_err() {
                    return;
                }
            }
        }
    });
    addr
}
