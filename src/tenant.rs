//! Tenant resolution — maps a request host onto a teacher's branded subdomain.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every page handler asks the resolver whether the current host belongs to
//! the main application or to a teacher tenant. Resolution is a pure function
//! of the host (plus the `tenant` query parameter under local development),
//! so it is safe to run on every request.
//!
//! TRADE-OFFS
//! ==========
//! The base domain is the last `base_domain_labels` labels of the host. The
//! default of two matches `example.uz`-style domains; deployments on
//! multi-label public suffixes (`school.co.uk`) must raise it or every
//! first-level label would be misread as a tenant.

use std::fmt;

use axum::http::HeaderMap;
use axum::http::header::HOST;
use serde::Serialize;

/// Query parameter that stands in for a subdomain on loopback hosts.
pub const TENANT_QUERY_PARAM: &str = "tenant";

pub const DEFAULT_BASE_DOMAIN_LABELS: usize = 2;

/// Subdomains that name platform infrastructure and never resolve to a tenant.
pub const RESERVED_SUBDOMAINS: &[&str] = &[
    "www", "app", "api", "admin", "dashboard", "blog", "help", "support", "docs", "status", "mail", "cdn", "static",
    "assets", "images", "dev", "staging", "test", "demo", "beta",
];

// =============================================================================
// TENANT ID
// =============================================================================

/// Lowercase teacher username extracted from the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// REQUEST ORIGIN
// =============================================================================

/// Scheme, host and port the client used to reach us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin {
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
}

impl RequestOrigin {
    /// Build from a scheme and an authority (`host` or `host:port`).
    #[must_use]
    pub fn new(scheme: &str, authority: &str) -> Self {
        let (host, port) = split_host_port(authority);
        Self { scheme: scheme.to_ascii_lowercase(), host: host.to_ascii_lowercase(), port }
    }

    /// Derive the origin from proxy-aware request headers.
    ///
    /// `X-Forwarded-Host` / `X-Forwarded-Proto` win over `Host` and the
    /// configured default scheme. Returns `None` when no host is present.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap, default_scheme: &str) -> Option<Self> {
        let authority = header_str(headers, "x-forwarded-host").or_else(|| header_str(headers, HOST.as_str()))?;
        let scheme = header_str(headers, "x-forwarded-proto").unwrap_or(default_scheme);
        Some(Self::new(scheme, authority))
    }

    #[must_use]
    pub fn is_https(&self) -> bool {
        self.scheme == "https"
    }

    /// Absolute URL for `path_and_query` on this origin.
    #[must_use]
    pub fn url(&self, path_and_query: &str) -> String {
        format!("{}://{}{}{}", self.scheme, self.host, self.port_suffix(), normalize_path(path_and_query))
    }

    fn port_suffix(&self) -> String {
        self.port.map(|p| format!(":{p}")).unwrap_or_default()
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        // Proxies may append a comma-separated chain; the first hop is the client's.
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Split `host:port`, leaving bracketed IPv6 literals intact.
pub(crate) fn split_host_port(authority: &str) -> (&str, Option<u16>) {
    if authority.starts_with('[') {
        return match authority.find(']') {
            Some(end) => {
                let port = authority[end + 1..]
                    .strip_prefix(':')
                    .and_then(|p| p.parse().ok());
                (&authority[..=end], port)
            }
            None => (authority, None),
        };
    }
    match authority.rsplit_once(':') {
        Some((host, port)) => match port.parse::<u16>() {
            Ok(port) => (host, Some(port)),
            Err(_) => (authority, None),
        },
        None => (authority, None),
    }
}

/// `localhost` and the IPv4 loopback literal accept the `tenant` override.
#[must_use]
pub fn is_loopback_host(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1")
}

/// Dotted-quad check: four labels of one to three ASCII digits.
#[must_use]
pub fn is_ipv4(host: &str) -> bool {
    let labels: Vec<&str> = host.split('.').collect();
    labels.len() == 4
        && labels
            .iter()
            .all(|l| (1..=3).contains(&l.len()) && l.bytes().all(|b| b.is_ascii_digit()))
}

/// Hosts where subdomains are unavailable and tenants travel in the query string.
fn uses_query_routing(host: &str) -> bool {
    is_loopback_host(host) || is_ipv4(host)
}

// =============================================================================
// RESOLVER
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantResolver {
    base_domain_labels: usize,
}

impl Default for TenantResolver {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DOMAIN_LABELS)
    }
}

impl TenantResolver {
    /// `base_domain_labels` is clamped to at least one label.
    #[must_use]
    pub fn new(base_domain_labels: usize) -> Self {
        Self { base_domain_labels: base_domain_labels.max(1) }
    }

    #[must_use]
    pub fn base_domain_labels(&self) -> usize {
        self.base_domain_labels
    }

    /// Resolve the tenant for `host`, consulting `tenant_param` only on loopback hosts.
    #[must_use]
    pub fn resolve(&self, host: &str, tenant_param: Option<&str>) -> Option<TenantId> {
        let (host, _) = split_host_port(host.trim());
        let host = host.to_ascii_lowercase();

        if is_loopback_host(&host) {
            return tenant_param
                .map(|t| t.trim().to_ascii_lowercase())
                .filter(|t| !t.is_empty())
                .map(TenantId);
        }
        if is_ipv4(&host) {
            return None;
        }

        let labels: Vec<&str> = host.split('.').collect();
        if labels.len() <= self.base_domain_labels {
            return None;
        }
        let first = labels[0];
        if first.is_empty() || RESERVED_SUBDOMAINS.contains(&first) {
            return None;
        }
        Some(TenantId(first.to_owned()))
    }

    /// Resolve from an absolute URL's host and `tenant` query parameter.
    #[must_use]
    pub fn resolve_url(&self, url: &str) -> Option<TenantId> {
        let url = reqwest::Url::parse(url).ok()?;
        let host = url.host_str()?;
        let tenant = url
            .query_pairs()
            .find(|(k, _)| k == TENANT_QUERY_PARAM)
            .map(|(_, v)| v.into_owned());
        self.resolve(host, tenant.as_deref())
    }

    #[must_use]
    pub fn is_teacher_subdomain(&self, host: &str, tenant_param: Option<&str>) -> bool {
        self.resolve(host, tenant_param).is_some()
    }

    #[must_use]
    pub fn is_main_app(&self, host: &str, tenant_param: Option<&str>) -> bool {
        self.resolve(host, tenant_param).is_none()
    }

    /// Last `base_domain_labels` labels of `host` (the whole host if shorter).
    #[must_use]
    pub fn base_domain(&self, host: &str) -> String {
        let labels: Vec<&str> = host.split('.').collect();
        let skip = labels.len().saturating_sub(self.base_domain_labels);
        labels[skip..].join(".")
    }

    /// Absolute URL that routes to `username`'s tenant.
    #[must_use]
    pub fn build_teacher_url(&self, origin: &RequestOrigin, username: &str, path: &str) -> String {
        let username = username.trim().to_ascii_lowercase();
        let path = normalize_path(path);
        if uses_query_routing(&origin.host) {
            let sep = if path.contains('?') { '&' } else { '?' };
            return format!(
                "{}://{}{}{path}{sep}{TENANT_QUERY_PARAM}={username}",
                origin.scheme,
                origin.host,
                origin.port_suffix()
            );
        }
        format!(
            "{}://{username}.{}{}{path}",
            origin.scheme,
            self.base_domain(&origin.host),
            origin.port_suffix()
        )
    }

    /// Absolute URL for the main application (`app.` subdomain in production).
    #[must_use]
    pub fn build_main_app_url(&self, origin: &RequestOrigin, path: &str) -> String {
        let path = normalize_path(path);
        if uses_query_routing(&origin.host) {
            return origin.url(&path);
        }
        format!(
            "{}://app.{}{}{path}",
            origin.scheme,
            self.base_domain(&origin.host),
            origin.port_suffix()
        )
    }
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') { path.to_owned() } else { format!("/{path}") }
}

#[cfg(test)]
#[path = "tenant_test.rs"]
mod tests;
