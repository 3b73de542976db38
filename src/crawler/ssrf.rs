//! Extends the URL-hygiene discipline already in `tools/crawl.rs`
//! (`resolve_url` / `should_crawl`) with hostname denylists and
//! DNS-resolved IP-range checks.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use url::Url;

const DENYLISTED_HOSTS: &[&str] = &[
    "localhost",
    "metadata.google.internal",
    "metadata.azure.com",
    "169.254.169.254",
];

/// Result of `is_safe`. `reason` is always populated (even on success, it
/// documents the check that passed) so callers can log the decision.
pub struct SsrfVerdict {
    pub ok: bool,
    pub reason: String,
}

impl SsrfVerdict {
    fn safe(reason: impl Into<String>) -> Self {
        Self {
            ok: true,
            reason: reason.into(),
        }
    }

    fn unsafe_(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: reason.into(),
        }
    }
}

/// Validate a URL as publicly reachable before fetching. Applied to every
/// seed at job creation and to every discovered link before enqueueing.
pub async fn is_safe(url: &str) -> SsrfVerdict {
    let parsed = match Url::parse(url) {
        Ok(u) => u,
        Err(e) => return SsrfVerdict::unsafe_(format!("unparseable url: {e}")),
    };

    match parsed.scheme() {
        "http" | "https" => {}
        other => return SsrfVerdict::unsafe_(format!("disallowed scheme: {other}")),
    }

    let host = match parsed.host_str() {
        Some(h) if !h.is_empty() => h.to_string(),
        _ => return SsrfVerdict::unsafe_("missing hostname".to_string()),
    };

    let host_lower = host.to_ascii_lowercase();
    if DENYLISTED_HOSTS.contains(&host_lower.as_str()) {
        return SsrfVerdict::unsafe_(format!("denylisted hostname: {host_lower}"));
    }

    // A literal IP in the URL is checked directly; a DNS name is resolved.
    if let Ok(ip) = host_lower.parse::<IpAddr>() {
        return verdict_for_ip(ip);
    }

    let lookup_target = format!("{host}:{}", parsed.port_or_known_default().unwrap_or(80));
    match tokio::net::lookup_host(lookup_target).await {
        Ok(addrs) => {
            let addrs: Vec<IpAddr> = addrs.map(|s| s.ip()).collect();
            if addrs.is_empty() {
                return SsrfVerdict::unsafe_(format!("dns resolved no addresses for {host}"));
            }
            for ip in &addrs {
                let v = verdict_for_ip(*ip);
                if !v.ok {
                    return SsrfVerdict::unsafe_(format!(
                        "{host} resolves to unsafe address {ip}: {}",
                        v.reason
                    ));
                }
            }
            SsrfVerdict::safe(format!("{host} resolves only to public addresses"))
        }
        Err(e) => SsrfVerdict::unsafe_(format!("dns resolution failed for {host}: {e}")),
    }
}

fn verdict_for_ip(ip: IpAddr) -> SsrfVerdict {
    match ip {
        IpAddr::V4(v4) => verdict_for_ipv4(v4),
        IpAddr::V6(v6) => verdict_for_ipv6(v6),
    }
}

fn verdict_for_ipv4(ip: Ipv4Addr) -> SsrfVerdict {
    if ip.is_loopback() {
        return SsrfVerdict::unsafe_("loopback address");
    }
    if ip.is_private() {
        return SsrfVerdict::unsafe_("RFC1918 private address");
    }
    if ip.is_link_local() {
        return SsrfVerdict::unsafe_("link-local address");
    }
    if ip.is_multicast() {
        return SsrfVerdict::unsafe_("multicast address");
    }
    if ip.is_broadcast() {
        return SsrfVerdict::unsafe_("broadcast address");
    }
    if ip.is_documentation() {
        return SsrfVerdict::unsafe_("documentation/reserved address");
    }
    if ip.is_unspecified() {
        return SsrfVerdict::unsafe_("unspecified address");
    }
    // CGNAT range 100.64.0.0/10 (not covered by std helpers).
    let octets = ip.octets();
    if octets[0] == 100 && (64..=127).contains(&octets[1]) {
        return SsrfVerdict::unsafe_("CGNAT (100.64.0.0/10) address");
    }
    SsrfVerdict::safe("public IPv4 address")
}

fn verdict_for_ipv6(ip: Ipv6Addr) -> SsrfVerdict {
    if ip.is_loopback() {
        return SsrfVerdict::unsafe_("loopback address");
    }
    if ip.is_unspecified() {
        return SsrfVerdict::unsafe_("unspecified address");
    }
    if ip.is_multicast() {
        return SsrfVerdict::unsafe_("multicast address");
    }
    // Unique local (fc00::/7) — the IPv6 equivalent of RFC1918.
    if (ip.segments()[0] & 0xfe00) == 0xfc00 {
        return SsrfVerdict::unsafe_("unique-local (fc00::/7) address");
    }
    // Link-local (fe80::/10).
    if (ip.segments()[0] & 0xffc0) == 0xfe80 {
        return SsrfVerdict::unsafe_("link-local (fe80::/10) address");
    }
    if let Some(v4) = ip.to_ipv4_mapped() {
        return verdict_for_ipv4(v4);
    }
    SsrfVerdict::safe("public IPv6 address")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_bad_scheme() {
        let v = is_safe("ftp://example.com/file").await;
        assert!(!v.ok);
    }

    #[tokio::test]
    async fn rejects_metadata_ip_literal() {
        let v = is_safe("http://169.254.169.254/latest/meta-data").await;
        assert!(!v.ok);
    }

    #[tokio::test]
    async fn rejects_loopback_literal() {
        let v = is_safe("http://127.0.0.1:8080/admin").await;
        assert!(!v.ok);
    }

    #[tokio::test]
    async fn rejects_private_literal() {
        let v = is_safe("http://10.0.0.5/internal").await;
        assert!(!v.ok);
    }

    #[tokio::test]
    async fn rejects_localhost_hostname() {
        let v = is_safe("http://localhost/").await;
        assert!(!v.ok);
    }

    #[tokio::test]
    async fn rejects_cgnat_literal() {
        let v = is_safe("http://100.70.0.1/").await;
        assert!(!v.ok);
    }

    #[tokio::test]
    async fn rejects_missing_host() {
        let v = is_safe("http:///no-host").await;
        assert!(!v.ok);
    }

    #[tokio::test]
    async fn accepts_public_ip_literal() {
        let v = is_safe("http://93.184.216.34/").await;
        assert!(v.ok);
    }
}
