//! Where a probe is sent and how the registry paths are built.

use crate::error::ProbeError;
use crate::http::ProbeRequest;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Target of a probe: the origin registry (optionally through a named proxy)
/// or the local proxy endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routing {
    /// Straight to the origin registry.
    Direct { origin: String },
    /// To the origin registry through an HTTP or SOCKS5 proxy.
    Proxy { origin: String, proxy: String },
    /// To the local proxy endpoint, which mirrors the origin's path shape.
    Local { endpoint: String },
}

impl Routing {
    /// Base URL the registry paths are appended to, without a trailing slash.
    pub fn base(&self) -> &str {
        let base = match self {
            Routing::Direct { origin } | Routing::Proxy { origin, .. } => origin,
            Routing::Local { endpoint } => endpoint,
        };
        base.trim_end_matches('/')
    }

    pub fn proxy(&self) -> Option<&str> {
        match self {
            Routing::Proxy { proxy, .. } => Some(proxy),
            Routing::Direct { .. } | Routing::Local { .. } => None,
        }
    }

    /// `{base}/api/v1/crates/{crate}`
    pub fn metadata_url(&self, crate_name: &str) -> String {
        format!("{}/api/v1/crates/{}", self.base(), crate_name)
    }

    /// `{base}/api/v1/crates/{crate}/{version}/download`
    pub fn download_url(&self, crate_name: &str, version: &str) -> String {
        format!("{}/api/v1/crates/{}/{}/download", self.base(), crate_name, version)
    }

    /// A GET request for `url` that honours this routing's proxy.
    pub fn request(&self, url: String, user_agent: &str, timeout: Duration) -> ProbeRequest {
        ProbeRequest::get(url, user_agent, timeout).with_proxy(self.proxy())
    }
}

impl fmt::Display for Routing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Routing::Direct { origin } => write!(f, "direct to {origin}"),
            Routing::Proxy { origin, proxy } => write!(f, "{origin} via {proxy}"),
            Routing::Local { endpoint } => write!(f, "local proxy {endpoint}"),
        }
    }
}

/// How the origin registry is reached for the reference download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OriginRoute {
    #[default]
    Direct,
    HttpProxy,
    Socks5Proxy,
}

impl FromStr for OriginRoute {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(OriginRoute::Direct),
            "http-proxy" | "http" => Ok(OriginRoute::HttpProxy),
            "socks5-proxy" | "socks5" => Ok(OriginRoute::Socks5Proxy),
            other => Err(format!(
                "unknown route {other:?} (expected direct, http-proxy or socks5-proxy)"
            )),
        }
    }
}

/// Which version of a crate to download.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VersionSpec {
    /// Resolved through the metadata endpoint (`crate.max_version`).
    #[default]
    Latest,
    Exact(String),
}

impl VersionSpec {
    /// `None`, empty or `latest` mean [`VersionSpec::Latest`].
    pub fn parse(s: Option<&str>) -> Self {
        match s.map(str::trim) {
            None | Some("") => VersionSpec::Latest,
            Some(v) if v.eq_ignore_ascii_case("latest") => VersionSpec::Latest,
            Some(v) => VersionSpec::Exact(v.to_string()),
        }
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSpec::Latest => f.write_str("latest"),
            VersionSpec::Exact(v) => f.write_str(v),
        }
    }
}

/// Trims `name` and checks it is a registry crate name: ASCII letters, digits,
/// `-` and `_` only. Names become URL segments and file names.
pub fn validate_crate_name(name: &str) -> Result<&str, ProbeError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ProbeError::InvalidInput(
            "crate name must not be empty".to_string(),
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ProbeError::InvalidInput(format!(
            "invalid crate name {name:?}: only letters, digits, '-' and '_' are allowed"
        )));
    }
    Ok(name)
}
