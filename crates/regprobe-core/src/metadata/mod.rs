//! Crate metadata probing.
//!
//! Fetches `{base}/api/v1/crates/{crate}` and extracts `crate.max_version`
//! and the description. Every failure is folded into [`MetadataResult`].

mod parse;

use crate::config::HarnessConfig;
use crate::error::{excerpt, ProbeError};
use crate::http;
use crate::routing::{validate_crate_name, Routing};

pub(crate) use parse::parse_crate_metadata;

/// Characters of the description kept for display.
pub const DESCRIPTION_LIMIT: usize = 100;
/// Characters of a non-200 body kept in the error description.
const ERROR_BODY_LIMIT: usize = 200;

/// Outcome of a metadata probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataResult {
    pub success: bool,
    /// Status code, if a response was received.
    pub status: Option<u32>,
    /// `crate.max_version`; present only on success.
    pub latest_version: Option<String>,
    /// Description truncated to [`DESCRIPTION_LIMIT`] characters.
    pub description: Option<String>,
    pub error: Option<String>,
}

impl MetadataResult {
    fn failed(err: &ProbeError, status: Option<u32>) -> Self {
        Self {
            success: false,
            status,
            latest_version: None,
            description: None,
            error: Some(err.to_string()),
        }
    }
}

/// Fetches crate metadata through `routing` with the metadata deadline.
pub fn probe_metadata(cfg: &HarnessConfig, crate_name: &str, routing: &Routing) -> MetadataResult {
    let crate_name = match validate_crate_name(crate_name) {
        Ok(name) => name,
        Err(err) => return MetadataResult::failed(&err, None),
    };

    let url = routing.metadata_url(crate_name);
    tracing::debug!(%url, %routing, "metadata probe");
    let request = routing
        .request(url, &cfg.user_agent, cfg.metadata_timeout())
        .with_header("Accept", "application/json");

    let response = match http::fetch(&request) {
        Ok(r) => r,
        Err(err) => {
            tracing::warn!(crate_name, %routing, "metadata request failed: {}", err);
            return MetadataResult::failed(&err, None);
        }
    };

    if response.status != 200 {
        let err = ProbeError::http_status(response.status, &response.body, ERROR_BODY_LIMIT);
        tracing::warn!(crate_name, %routing, "metadata lookup rejected: {}", err);
        return MetadataResult::failed(&err, Some(response.status));
    }

    match parse_crate_metadata(&response.body) {
        Ok(meta) => MetadataResult {
            success: true,
            status: Some(response.status),
            latest_version: Some(meta.max_version),
            description: meta
                .description
                .map(|d| excerpt(d.trim(), DESCRIPTION_LIMIT)),
            error: None,
        },
        Err(err) => {
            tracing::warn!(crate_name, %routing, "{}", err);
            MetadataResult::failed(&err, Some(response.status))
        }
    }
}
