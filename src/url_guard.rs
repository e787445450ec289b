// src/url_guard.rs
//! SSRF guard for user-supplied URLs.
//!
//! A URL is accepted only if it is absolute http/https, carries no
//! credentials, targets neither a blocked internal hostname nor a port
//! other than 80/443, and every address its host resolves to is public.
//! The check runs against the *resolved* addresses, and the returned
//! [`ValidatedUrl`] carries them so the fetch can connect to exactly
//! what was checked.

use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use metrics::counter;
use url::{Host, Url};

use crate::error::UrlRejection;

const BLOCKED_HOST_SUFFIXES: &[&str] = &[".local", ".internal", ".cluster.local", ".svc"];
const ALLOWED_PORTS: &[u16] = &[80, 443];

/// DNS seam. Production uses the system resolver; tests inject fixed answers.
#[async_trait::async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, host: &str, port: u16) -> std::io::Result<Vec<IpAddr>>;
}

/// Resolves through the OS (getaddrinfo via tokio's blocking pool).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait::async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, host: &str, port: u16) -> std::io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, port)).await?;
        Ok(addrs.map(|sa| sa.ip()).collect())
    }
}

/// Fixed host -> addresses table. Unknown hosts fail to resolve.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    table: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, host: &str, addrs: &[IpAddr]) -> Self {
        self.table.insert(host.to_ascii_lowercase(), addrs.to_vec());
        self
    }
}

#[async_trait::async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, host: &str, _port: u16) -> std::io::Result<Vec<IpAddr>> {
        self.table
            .get(&host.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotFound, format!("no such host: {host}"))
            })
    }
}

/// A URL that passed every check at validation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUrl {
    url: Url,
    addrs: Vec<SocketAddr>,
}

impl ValidatedUrl {
    /// Pin `url` to `addrs` without any checks, for pointing the fetcher at
    /// a local test server.
    #[cfg(test)]
    pub(crate) fn pinned(url: Url, addrs: Vec<SocketAddr>) -> Self {
        Self { url, addrs }
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Hostname as written in the URL (domain or IP literal).
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn is_domain(&self) -> bool {
        matches!(self.url.host(), Some(Host::Domain(_)))
    }

    /// Public socket addresses the host resolved to.
    pub fn addrs(&self) -> &[SocketAddr] {
        &self.addrs
    }
}

impl fmt::Display for ValidatedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Validate `raw` and resolve its host through `resolver`.
pub async fn validate_url(
    raw: &str,
    resolver: &dyn Resolver,
) -> Result<ValidatedUrl, UrlRejection> {
    let res = check(raw, resolver).await;
    if let Err(reason) = &res {
        counter!("url_rejections_total", "reason" => reason.label()).increment(1);
        tracing::warn!(target: "url_guard", reason = reason.label(), detail = %reason, "url rejected");
    }
    res
}

async fn check(raw: &str, resolver: &dyn Resolver) -> Result<ValidatedUrl, UrlRejection> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UrlRejection::Empty);
    }

    let url = Url::parse(raw).map_err(|e| UrlRejection::Malformed(e.to_string()))?;

    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(UrlRejection::UnsupportedScheme(scheme.to_string()));
    }

    let host = match url.host() {
        Some(h) if !url.host_str().unwrap_or_default().is_empty() => h.to_owned(),
        _ => return Err(UrlRejection::MissingHost),
    };

    if !url.username().is_empty() || url.password().is_some() {
        return Err(UrlRejection::EmbeddedCredentials);
    }

    if let Host::Domain(name) = &host {
        if is_blocked_hostname(name) {
            return Err(UrlRejection::BlockedHost(name.clone()));
        }
    }

    // `Url::port` is None when the port is absent or equals the scheme default.
    if let Some(port) = url.port() {
        if !ALLOWED_PORTS.contains(&port) {
            return Err(UrlRejection::DisallowedPort(port));
        }
    }
    let port = url.port_or_known_default().unwrap_or(80);

    let ips: Vec<IpAddr> = match &host {
        Host::Ipv4(ip) => vec![IpAddr::V4(*ip)],
        Host::Ipv6(ip) => vec![IpAddr::V6(*ip)],
        Host::Domain(name) => match resolver.resolve(name, port).await {
            Ok(v) if !v.is_empty() => v,
            Ok(_) => return Err(UrlRejection::Unresolvable(name.clone())),
            Err(e) => {
                tracing::debug!(target: "url_guard", host = %name, error = %e, "dns lookup failed");
                return Err(UrlRejection::Unresolvable(name.clone()));
            }
        },
    };

    if let Some(bad) = ips.iter().copied().find(|ip| non_public_class(*ip).is_some()) {
        return Err(UrlRejection::NonPublicAddress(bad));
    }

    let addrs = ips.into_iter().map(|ip| SocketAddr::new(ip, port)).collect();
    Ok(ValidatedUrl { url, addrs })
}

fn is_blocked_hostname(name: &str) -> bool {
    let h = name.trim_end_matches('.').to_ascii_lowercase();
    h == "localhost" || BLOCKED_HOST_SUFFIXES.iter().any(|s| h.ends_with(s))
}

/// Classify an address that must never be fetched. `None` means public.
pub fn non_public_class(ip: IpAddr) -> Option<&'static str> {
    match ip {
        IpAddr::V4(v4) => v4_class(v4),
        IpAddr::V6(v6) => v6_class(v6),
    }
}

fn v4_class(ip: Ipv4Addr) -> Option<&'static str> {
    let o = ip.octets();
    if o[0] == 0 {
        return Some("unspecified");
    }
    if ip.is_loopback() {
        return Some("loopback");
    }
    if ip.is_private() {
        return Some("private");
    }
    if ip.is_link_local() {
        return Some("link_local");
    }
    if o[0] == 100 && (o[1] & 0xc0) == 64 {
        return Some("shared");
    }
    if ip.is_multicast() {
        return Some("multicast");
    }
    if ip.is_broadcast() {
        return Some("broadcast");
    }
    if ip.is_documentation() {
        return Some("documentation");
    }
    if o[0] == 198 && (o[1] & 0xfe) == 18 {
        return Some("benchmarking");
    }
    if (o[0] == 192 && o[1] == 0 && o[2] == 0) || o[0] >= 240 {
        return Some("reserved");
    }
    None
}

fn v6_class(ip: Ipv6Addr) -> Option<&'static str> {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return v4_class(v4);
    }
    if ip.is_unspecified() {
        return Some("unspecified");
    }
    if ip.is_loopback() {
        return Some("loopback");
    }
    let seg = ip.segments();
    // NAT64 well-known prefix 64:ff9b::/96
    if seg[..6] == [0x64, 0xff9b, 0, 0, 0, 0] {
        return v4_class(embedded_v4(seg[6], seg[7]));
    }
    if ip.is_multicast() {
        return Some("multicast");
    }
    if (seg[0] & 0xffc0) == 0xfe80 {
        return Some("link_local");
    }
    if (seg[0] & 0xfe00) == 0xfc00 {
        return Some("private");
    }
    // Outside global unicast 2000::/3 (site-local, IPv4-compatible, discard, ...).
    if (seg[0] & 0xe000) != 0x2000 {
        return Some("reserved");
    }
    if seg[0] == 0x2001 && seg[1] == 0x0db8 {
        return Some("documentation");
    }
    // 2001::/23 IETF protocol assignments (Teredo, ORCHID, benchmarking).
    if seg[0] == 0x2001 && seg[1] < 0x0200 {
        return Some("reserved");
    }
    // 6to4 carries an IPv4 address in bits 16..48.
    if seg[0] == 0x2002 {
        return v4_class(embedded_v4(seg[1], seg[2]));
    }
    None
}

fn embedded_v4(hi: u16, lo: u16) -> Ipv4Addr {
    let [a, b] = hi.to_be_bytes();
    let [c, d] = lo.to_be_bytes();
    Ipv4Addr::new(a, b, c, d)
}
