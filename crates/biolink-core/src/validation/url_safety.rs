//! SSRF (Server-Side Request Forgery) validation for source image URLs
//!
//! The baseline check is lexical: the hostname as written in the URL is compared
//! against a fixed table of private and reserved ranges. It does not resolve DNS, so a
//! public hostname whose record points at a private address (DNS rebinding) passes
//! this layer. [`verify_resolved_addresses`] resolves a hostname once and checks every
//! address, for diagnostics. The fetcher enforces the same table at connect time, on
//! the addresses it actually dials, when resolved-address verification is enabled.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use tokio::net::lookup_host;
use url::{Host, Url};

/// Returns `true` when the URL must not be fetched.
///
/// Fails closed: unparseable URLs, URLs without a host and non-HTTP(S) schemes are
/// all blocked.
pub fn is_blocked_source_url(url: &str) -> bool {
    match Url::parse(url.trim()) {
        Ok(parsed) => is_blocked_url(&parsed),
        Err(_) => true,
    }
}

/// Same check as [`is_blocked_source_url`] for an already parsed URL (used for
/// redirect hops).
pub fn is_blocked_url(url: &Url) -> bool {
    if url.scheme() != "http" && url.scheme() != "https" {
        return true;
    }

    match url.host() {
        None => true,
        Some(Host::Domain(domain)) => is_internal_hostname(domain),
        Some(Host::Ipv4(ip)) => is_private_ip(&IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => is_private_ip(&IpAddr::V6(ip)),
    }
}

fn is_internal_hostname(domain: &str) -> bool {
    let host = domain.trim_end_matches('.').to_lowercase();
    if host.is_empty() || host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    // Domains the URL parser did not normalize into an IP literal (e.g. with a
    // trailing label) are still compared as written.
    match host.parse::<IpAddr>() {
        Ok(ip) => is_private_ip(&ip),
        Err(_) => false,
    }
}

/// Resolve the URL's hostname and reject it when any resolved address is private.
///
/// Returns `Err` with the offending address. A resolution failure is not treated as a
/// block here; the fetch itself will then fail with a network error.
pub async fn verify_resolved_addresses(url: &Url) -> Result<(), String> {
    let host = match url.host() {
        Some(Host::Domain(domain)) => domain.to_string(),
        Some(Host::Ipv4(ip)) => return check_ip(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => return check_ip(IpAddr::V6(ip)),
        None => return Err("URL has no host".to_string()),
    };
    let port = url.port_or_known_default().unwrap_or(80);

    let resolved = lookup_host((host.as_str(), port)).await;
    match resolved {
        Ok(addrs) => {
            for addr in addrs {
                check_ip(addr.ip())?;
            }
            Ok(())
        }
        Err(e) => {
            tracing::warn!(host = %host, error = %e, "Failed to resolve hostname for SSRF validation");
            Ok(())
        }
    }
}

fn check_ip(ip: IpAddr) -> Result<(), String> {
    if is_private_ip(&ip) {
        return Err(format!("resolves to private/internal IP address {}", ip));
    }
    Ok(())
}

/// Check if an IP address is private/internal
///
/// Returns true for:
/// - IPv4 loopback: 127.0.0.0/8
/// - IPv4 private ranges: 10.0.0.0/8, 172.16.0.0/12, 192.168.0.0/16
/// - IPv4 link-local: 169.254.0.0/16
/// - IPv4 multicast: 224.0.0.0/4
/// - IPv4 reserved: 0.0.0.0/8
/// - IPv6 loopback, unspecified and multicast
/// - IPv6 link-local: fe80::/10
/// - IPv6 unique local: fc00::/7
/// - IPv4-mapped IPv6 addresses of any of the above
pub fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => is_private_ipv4(ipv4),
        IpAddr::V6(ipv6) => {
            if let Some(ipv4) = ipv6.to_ipv4_mapped() {
                return is_private_ipv4(&ipv4);
            }
            ipv6.is_loopback()
                || ipv6.is_unspecified()
                || ipv6.is_multicast()
                || is_ipv6_link_local(ipv6)
                || is_ipv6_unique_local(ipv6)
        }
    }
}

fn is_private_ipv4(ip: &Ipv4Addr) -> bool {
    let octets = ip.octets();
    octets[0] == 10
        || (octets[0] == 172 && (16..=31).contains(&octets[1]))
        || (octets[0] == 192 && octets[1] == 168)
        || octets[0] == 127
        || (octets[0] == 169 && octets[1] == 254)
        || (224..=239).contains(&octets[0])
        || octets[0] == 0
}

fn is_ipv6_link_local(ip: &Ipv6Addr) -> bool {
    ip.segments()[0] & 0xffc0 == 0xfe80
}

fn is_ipv6_unique_local(ip: &Ipv6Addr) -> bool {
    ip.segments()[0] & 0xfe00 == 0xfc00
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_loopback_and_localhost() {
        assert!(is_blocked_source_url("http://127.0.0.1/a.png"));
        assert!(is_blocked_source_url("http://127.12.0.9:8080/a.png"));
        assert!(is_blocked_source_url("http://localhost/a.png"));
        assert!(is_blocked_source_url("https://LOCALHOST./a.png"));
        assert!(is_blocked_source_url("http://api.localhost/a.png"));
        assert!(is_blocked_source_url("http://[::1]/a.png"));
    }

    #[test]
    fn test_blocks_private_ranges() {
        assert!(is_blocked_source_url("http://10.0.0.1/a.png"));
        assert!(is_blocked_source_url("http://172.16.0.1/a.png"));
        assert!(is_blocked_source_url("http://172.31.255.255/a.png"));
        assert!(is_blocked_source_url("http://192.168.1.1/a.png"));
        assert!(is_blocked_source_url("http://169.254.169.254/latest/meta-data"));
        assert!(is_blocked_source_url("http://0.0.0.0/a.png"));
    }

    #[test]
    fn test_blocks_ipv6_reserved_prefixes() {
        assert!(is_blocked_source_url("http://[fd12:3456::1]/a.png"));
        assert!(is_blocked_source_url("http://[fe80::1]/a.png"));
        assert!(is_blocked_source_url("http://[::ffff:127.0.0.1]/a.png"));
        assert!(is_blocked_source_url("http://[::ffff:10.0.0.1]/a.png"));
    }

    #[test]
    fn test_allows_public_hosts() {
        assert!(!is_blocked_source_url("https://example.com/a.png"));
        assert!(!is_blocked_source_url("https://8.8.8.8/a.png"));
        assert!(!is_blocked_source_url("http://172.32.0.1/a.png"));
        assert!(!is_blocked_source_url("http://172.15.0.1/a.png"));
        assert!(!is_blocked_source_url("https://[2606:4700:4700::1111]/a.png"));
    }

    #[test]
    fn test_fails_closed_on_unparseable_or_odd_urls() {
        assert!(is_blocked_source_url(""));
        assert!(is_blocked_source_url("not-a-url"));
        assert!(is_blocked_source_url("file:///etc/passwd"));
        assert!(is_blocked_source_url("ftp://example.com/a.png"));
        assert!(is_blocked_source_url("data:image/png;base64,AAAA"));
    }

    #[test]
    fn test_lexical_check_does_not_resolve_dns() {
        // Resolves to loopback on public DNS, but the literal hostname is public.
        assert!(!is_blocked_source_url("http://127.0.0.1.nip.io/a.png"));
    }

    #[test]
    fn test_is_private_ip() {
        assert!(is_private_ip(&IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))));
        assert!(is_private_ip(&IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))));
        assert!(is_private_ip(&IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))));
        assert!(is_private_ip(&IpAddr::V4(Ipv4Addr::new(172, 16, 0, 1))));
        assert!(is_private_ip(&IpAddr::V4(Ipv4Addr::new(169, 254, 1, 1))));

        assert!(!is_private_ip(&IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))));
        assert!(!is_private_ip(&IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1))));

        assert!(is_private_ip(&IpAddr::V6(Ipv6Addr::LOCALHOST)));
        assert!(is_private_ip(&IpAddr::V6(Ipv6Addr::UNSPECIFIED)));
    }

    #[tokio::test]
    async fn test_verify_resolved_addresses_checks_ip_literals() {
        let url = Url::parse("http://10.1.2.3/a.png").unwrap();
        assert!(verify_resolved_addresses(&url).await.is_err());

        let url = Url::parse("http://8.8.8.8/a.png").unwrap();
        assert!(verify_resolved_addresses(&url).await.is_ok());
    }

    #[tokio::test]
    async fn test_verify_resolved_addresses_rejects_localhost_resolution() {
        let url = Url::parse("http://localhost:8080/a.png").unwrap();
        assert!(verify_resolved_addresses(&url).await.is_err());
    }
}
