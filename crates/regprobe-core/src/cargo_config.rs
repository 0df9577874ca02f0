//! Package-manager client configuration pointing the default source at the
//! local proxy endpoint.
//!
//! The written document is fixed apart from the endpoint:
//!
//! ```toml
//! [source.crates-io]
//! replace-with = "local-proxy"
//!
//! [source.local-proxy]
//! registry = "http://127.0.0.1:8080"
//!
//! [net]
//! git-fetch-with-cli = true
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ProbeError;

/// Name of the replacement source.
pub const LOCAL_SOURCE: &str = "local-proxy";

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
struct ClientConfig {
    source: Sources,
    net: Net,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
struct Sources {
    #[serde(rename = "crates-io")]
    crates_io: Replacement,
    #[serde(rename = "local-proxy")]
    local_proxy: Registry,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
struct Replacement {
    #[serde(rename = "replace-with")]
    replace_with: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
struct Registry {
    registry: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
struct Net {
    #[serde(rename = "git-fetch-with-cli")]
    git_fetch_with_cli: bool,
}

/// `$CARGO_HOME/config.toml`, or `~/.cargo/config.toml` when `CARGO_HOME` is unset.
pub fn default_path() -> Result<PathBuf, ProbeError> {
    if let Some(home) = env::var_os("CARGO_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home).join("config.toml"));
    }
    let home = env::var_os("HOME")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ProbeError::InvalidInput("HOME is not set".to_string()))?;
    Ok(PathBuf::from(home).join(".cargo").join("config.toml"))
}

/// Renders the configuration document for `local_endpoint`.
pub fn render(local_endpoint: &str) -> Result<String, ProbeError> {
    let doc = ClientConfig {
        source: Sources {
            crates_io: Replacement {
                replace_with: LOCAL_SOURCE.to_string(),
            },
            local_proxy: Registry {
                registry: local_endpoint.to_string(),
            },
        },
        net: Net {
            git_fetch_with_cli: true,
        },
    };
    toml::to_string(&doc).map_err(|e| ProbeError::Parse(e.to_string()))
}

/// Writes the document to `path`, creating parent directories and replacing
/// any existing file. Writing the same endpoint twice yields identical bytes.
pub fn write_client_config(path: &Path, local_endpoint: &str) -> Result<(), ProbeError> {
    let content = render(local_endpoint)?;
    if let Some(parent) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ProbeError::fs(parent, e))?;
    }
    if path.exists() {
        tracing::info!(path = %path.display(), "replacing existing client configuration");
    }
    fs::write(path, content).map_err(|e| ProbeError::fs(path, e))?;
    tracing::info!(path = %path.display(), local_endpoint, "client configuration written");
    Ok(())
}
