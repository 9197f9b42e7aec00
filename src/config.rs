//! Portal configuration parsed from environment variables.

use crate::tenant::DEFAULT_BASE_DOMAIN_LABELS;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_PUBLIC_ORIGIN: &str = "http://localhost:3000";
pub const DEFAULT_API_REQUEST_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_API_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_LOGOUT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const DEFAULT_FALLBACK_PATH: &str = "/dashboard";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    Missing(&'static str),
    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalConfig {
    pub port: u16,
    pub api_base_url: String,
    pub public_origin: String,
    /// Explicit `Secure` cookie override; inferred per request when absent.
    pub cookie_secure: Option<bool>,
    pub base_domain_labels: usize,
    pub api_timeouts: ApiTimeouts,
    /// Upper bound on the remote half of a logout.
    pub logout_timeout_secs: u64,
    pub login_path: String,
    pub fallback_path: String,
}

impl PortalConfig {
    /// Build typed config from environment variables.
    ///
    /// Required:
    /// - `API_BASE_URL`
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `PUBLIC_ORIGIN`: default `http://localhost:3000`
    /// - `COOKIE_SECURE`: `1/true/yes/on` or `0/false/no/off`
    /// - `BASE_DOMAIN_LABELS`: default 2
    /// - `API_REQUEST_TIMEOUT_SECS`: default 15
    /// - `API_CONNECT_TIMEOUT_SECS`: default 5
    /// - `LOGOUT_TIMEOUT_SECS`: default 5
    /// - `LOGIN_PATH`: default `/login`
    /// - `FALLBACK_PATH`: default `/dashboard`
    ///
    /// # Errors
    ///
    /// Returns an error if `API_BASE_URL` is missing or a numeric var is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_base_url = std::env::var("API_BASE_URL")
            .map_err(|_| ConfigError::Missing("API_BASE_URL"))?
            .trim_end_matches('/')
            .to_owned();
        let public_origin = std::env::var("PUBLIC_ORIGIN")
            .unwrap_or_else(|_| DEFAULT_PUBLIC_ORIGIN.to_owned())
            .trim_end_matches('/')
            .to_owned();

        Ok(Self {
            port: env_parse("PORT", DEFAULT_PORT)?,
            api_base_url,
            public_origin,
            cookie_secure: env_bool("COOKIE_SECURE"),
            base_domain_labels: env_parse("BASE_DOMAIN_LABELS", DEFAULT_BASE_DOMAIN_LABELS)?,
            api_timeouts: ApiTimeouts {
                request_secs: env_parse("API_REQUEST_TIMEOUT_SECS", DEFAULT_API_REQUEST_TIMEOUT_SECS)?,
                connect_secs: env_parse("API_CONNECT_TIMEOUT_SECS", DEFAULT_API_CONNECT_TIMEOUT_SECS)?,
            },
            logout_timeout_secs: env_parse("LOGOUT_TIMEOUT_SECS", DEFAULT_LOGOUT_TIMEOUT_SECS)?,
            login_path: std::env::var("LOGIN_PATH").unwrap_or_else(|_| DEFAULT_LOGIN_PATH.to_owned()),
            fallback_path: std::env::var("FALLBACK_PATH").unwrap_or_else(|_| DEFAULT_FALLBACK_PATH.to_owned()),
        })
    }

    /// Scheme assumed when no `X-Forwarded-Proto` header is present.
    #[must_use]
    pub fn default_scheme(&self) -> &'static str {
        if self.public_origin.starts_with("https://") { "https" } else { "http" }
    }
}

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

fn env_parse<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
