//! DNS resolution for the fetcher's HTTP client.
//!
//! [`PublicAddressResolver`] is installed with `ClientBuilder::dns_resolver` when
//! resolved-address verification is on. Every host the client connects to goes
//! through it, redirect hops included, and the addresses it returns are the ones that
//! get dialed. A host with any private or reserved address is refused outright, so a
//! rebinding record cannot slip a private target in between the check and the connect.
//! IP-literal hosts never reach a resolver; the lexical check covers those.

use std::error::Error as StdError;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use biolink_core::is_private_ip;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use tokio::net::lookup_host;

type BoxError = Box<dyn StdError + Send + Sync>;

/// A hostname resolved to an address the fetcher must not connect to.
#[derive(Debug, thiserror::Error)]
#[error("{host} resolves to private or reserved address {address}")]
pub struct PrivateAddressResolved {
    pub host: String,
    pub address: IpAddr,
}

/// System resolver (`getaddrinfo` via tokio's blocking pool).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl Resolve for SystemResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(lookup_system(name.as_str().to_string()))
    }
}

async fn lookup_system(host: String) -> Result<Addrs, BoxError> {
    // Port 0: the connector sets the URL's port on every returned address.
    let resolved = lookup_host((host.as_str(), 0)).await;
    let addrs: Vec<SocketAddr> = resolved?.collect();
    Ok(Box::new(addrs.into_iter()))
}

/// Wraps another resolver and refuses hosts that resolve to private addresses.
#[derive(Clone)]
pub struct PublicAddressResolver {
    inner: Arc<dyn Resolve>,
}

impl PublicAddressResolver {
    pub fn new(inner: Arc<dyn Resolve>) -> Self {
        Self { inner }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemResolver))
    }
}

impl Resolve for PublicAddressResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let host = name.as_str().to_string();
        let lookup = self.inner.resolve(name);
        Box::pin(async move {
            let addrs: Vec<SocketAddr> = lookup.await?.collect();
            check_public(&host, addrs)
        })
    }
}

fn check_public(host: &str, addrs: Vec<SocketAddr>) -> Result<Addrs, BoxError> {
    if let Some(private) = addrs.iter().find(|addr| is_private_ip(&addr.ip())) {
        tracing::warn!(
            host = %host,
            address = %private.ip(),
            "Refusing to connect to host resolving to a private address"
        );
        return Err(Box::new(PrivateAddressResolved {
            host: host.to_string(),
            address: private.ip(),
        }));
    }
    Ok(Box::new(addrs.into_iter()))
}

/// Find a resolver refusal anywhere in a request error's source chain.
pub(crate) fn find_private_resolution(err: &reqwest::Error) -> Option<&PrivateAddressResolved> {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(refused) = cause.downcast_ref::<PrivateAddressResolved>() {
            return Some(refused);
        }
        source = cause.source();
    }
    None
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::net::Ipv4Addr;

    /// Fixed host table standing in for DNS.
    pub(crate) struct StaticResolver(pub HashMap<String, IpAddr>);

    impl StaticResolver {
        pub(crate) fn single(host: &str, ip: IpAddr) -> Self {
            Self(HashMap::from([(host.to_string(), ip)]))
        }
    }

    impl Resolve for StaticResolver {
        fn resolve(&self, name: Name) -> Resolving {
            let result: Result<Addrs, BoxError> = match self.0.get(name.as_str()) {
                Some(ip) => Ok(Box::new(std::iter::once(SocketAddr::new(*ip, 0)))),
                None => Err(format!("no address for {}", name.as_str()).into()),
            };
            Box::pin(async move { result })
        }
    }

    #[test]
    fn test_check_public_refuses_any_private_address() {
        let addrs = vec![
            SocketAddr::from((Ipv4Addr::new(93, 184, 216, 34), 0)),
            SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
        ];
        let err = check_public("mixed.example.net", addrs).err().unwrap();
        let refused = err.downcast_ref::<PrivateAddressResolved>().unwrap();
        assert_eq!(refused.host, "mixed.example.net");
        assert_eq!(refused.address, IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn test_check_public_passes_public_addresses_through() {
        let public = SocketAddr::from((Ipv4Addr::new(93, 184, 216, 34), 0));
        let addrs: Vec<SocketAddr> = check_public("cdn.example.net", vec![public])
            .unwrap()
            .collect();
        assert_eq!(addrs, vec![public]);
    }

    #[tokio::test]
    async fn test_guard_wraps_inner_resolver() {
        let guard = PublicAddressResolver::new(Arc::new(StaticResolver::single(
            "internal.example.net",
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)),
        )));
        let name: Name = "internal.example.net".parse().unwrap();
        let err = guard.resolve(name).await.err().unwrap();
        assert!(err.to_string().contains("10.0.0.7"));
    }

    #[tokio::test]
    async fn test_system_guard_refuses_localhost() {
        let name: Name = "localhost".parse().unwrap();
        let err = PublicAddressResolver::system().resolve(name).await.err().unwrap();
        assert!(err.downcast_ref::<PrivateAddressResolved>().is_some());
    }
}
