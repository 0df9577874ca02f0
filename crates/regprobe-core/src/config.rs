use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::routing::{OriginRoute, Routing};

/// User agent sent with every probe; registries reject anonymous clients.
pub const DEFAULT_USER_AGENT: &str = "cargo 1.75.0 (1e801010e 2023-11-09)";

/// Harness configuration loaded from `~/.config/regprobe/config.toml`.
///
/// Missing keys take the documented defaults, so a partial file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Origin registry base URL. Default `https://crates.io`.
    pub origin_url: String,
    /// Local proxy endpoint base URL. Default `http://127.0.0.1:8080`.
    pub local_endpoint: String,
    /// HTTP proxy used when the origin is reached with `http-proxy`.
    pub http_proxy: String,
    /// SOCKS5 proxy used when the origin is reached with `socks5-proxy`.
    pub socks5_proxy: String,
    pub user_agent: String,
    /// Deadline for metadata lookups in seconds. Default 10.
    pub metadata_timeout_secs: u64,
    /// Deadline for artifact downloads in seconds. Default 30.
    pub download_timeout_secs: u64,
    /// Deadline for each build tool invocation in seconds. Default 60.
    pub build_timeout_secs: u64,
    /// Proxy cache directory inspected (read-only). Default `./cache`.
    pub cache_root: PathBuf,
    /// Where downloaded artifacts are saved. Default `.`.
    pub artifact_dir: PathBuf,
    /// Ephemeral project used by the build smoke test. Default `./test_crate`.
    pub smoke_dir: PathBuf,
    /// Build tool program. Default `cargo`.
    pub build_tool: String,
    /// Arguments placed before every build tool subcommand (e.g. `+nightly`).
    pub build_tool_args: Vec<String>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            origin_url: "https://crates.io".to_string(),
            local_endpoint: "http://127.0.0.1:8080".to_string(),
            http_proxy: "http://172.16.0.80:9051".to_string(),
            socks5_proxy: "socks5://172.16.0.80:9050".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            metadata_timeout_secs: 10,
            download_timeout_secs: 30,
            build_timeout_secs: 60,
            cache_root: PathBuf::from("./cache"),
            artifact_dir: PathBuf::from("."),
            smoke_dir: PathBuf::from("./test_crate"),
            build_tool: "cargo".to_string(),
            build_tool_args: Vec::new(),
        }
    }
}

impl HarnessConfig {
    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    /// Routing for the reference download from the origin registry.
    pub fn origin_routing(&self, route: OriginRoute) -> Routing {
        let origin = self.origin_url.clone();
        match route {
            OriginRoute::Direct => Routing::Direct { origin },
            OriginRoute::HttpProxy => Routing::Proxy {
                origin,
                proxy: self.http_proxy.clone(),
            },
            OriginRoute::Socks5Proxy => Routing::Proxy {
                origin,
                proxy: self.socks5_proxy.clone(),
            },
        }
    }

    pub fn local_routing(&self) -> Routing {
        Routing::Local {
            endpoint: self.local_endpoint.clone(),
        }
    }

    /// Rejects unusable endpoints and zero deadlines.
    pub fn validate(&self) -> Result<()> {
        check_url("origin_url", &self.origin_url, &["http", "https"])?;
        check_url("local_endpoint", &self.local_endpoint, &["http", "https"])?;
        let proxy_schemes = ["http", "https", "socks4", "socks4a", "socks5", "socks5h"];
        check_url("http_proxy", &self.http_proxy, &proxy_schemes)?;
        check_url("socks5_proxy", &self.socks5_proxy, &proxy_schemes)?;
        for (name, secs) in [
            ("metadata_timeout_secs", self.metadata_timeout_secs),
            ("download_timeout_secs", self.download_timeout_secs),
            ("build_timeout_secs", self.build_timeout_secs),
        ] {
            if secs == 0 {
                bail!("{name} must be greater than zero");
            }
        }
        if self.build_tool.trim().is_empty() {
            bail!("build_tool must not be empty");
        }
        Ok(())
    }
}

fn check_url(field: &str, value: &str, schemes: &[&str]) -> Result<()> {
    let parsed = url::Url::parse(value).with_context(|| format!("{field}: invalid URL {value:?}"))?;
    if !schemes.contains(&parsed.scheme()) {
        bail!(
            "{field}: unsupported scheme {:?} (expected one of {})",
            parsed.scheme(),
            schemes.join(", ")
        );
    }
    if parsed.host_str().is_none() {
        bail!("{field}: URL {value:?} has no host");
    }
    Ok(())
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("regprobe")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<HarnessConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = HarnessConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    load_from(&path)
}

/// Load configuration from an explicit file; it must exist.
pub fn load_from(path: &Path) -> Result<HarnessConfig> {
    let data =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let cfg: HarnessConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    Ok(cfg)
}
