//! Download probe: fetch one crate archive, time it, and keep the bytes.
//!
//! On HTTP 200 the body is written to `test_{crate}.tar.gz` in the artifact
//! directory via a `.part` file and an atomic rename, so a reader never sees
//! a half-written artifact.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::checksum;
use crate::config::HarnessConfig;
use crate::error::ProbeError;
use crate::http;
use crate::metadata;
use crate::routing::{validate_crate_name, Routing, VersionSpec};

/// Characters of a non-200 body kept in the error description.
const ERROR_BODY_LIMIT: usize = 200;

/// Outcome of one download probe. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub success: bool,
    /// Status code, present only if a response was received.
    pub status: Option<u32>,
    /// Time spent on the download request (metadata lookup excluded).
    pub elapsed: Duration,
    /// Body length in bytes; zero unless the status was 200.
    pub bytes: u64,
    /// Present only on failure; never empty.
    pub error: Option<String>,
    /// Version actually requested (resolved when asked for latest).
    pub version: Option<String>,
    /// Saved artifact, on success.
    pub artifact: Option<PathBuf>,
    /// SHA-256 of the body (hex), on success.
    pub sha256: Option<String>,
}

impl ProbeResult {
    fn failed(error: String, status: Option<u32>, elapsed: Duration, version: Option<String>) -> Self {
        Self {
            success: false,
            status,
            elapsed,
            bytes: 0,
            error: Some(error),
            version,
            artifact: None,
            sha256: None,
        }
    }

    /// Elapsed seconds, for display.
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

/// Deterministic artifact file name for a crate: `test_{crate}.tar.gz`.
pub fn artifact_file_name(crate_name: &str) -> String {
    format!("test_{crate_name}.tar.gz")
}

/// Path for the temp file: appends `.part` to the final path.
fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(".part");
    PathBuf::from(o)
}

fn write_artifact(final_path: &Path, data: &[u8]) -> Result<(), ProbeError> {
    if let Some(dir) = final_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| ProbeError::fs(dir, e))?;
    }
    let tmp = temp_path(final_path);
    let written = fs::write(&tmp, data)
        .map_err(|e| ProbeError::fs(&tmp, e))
        .and_then(|()| fs::rename(&tmp, final_path).map_err(|e| ProbeError::fs(final_path, e)));
    if written.is_err() {
        // No partial artifact survives a failed write or rename.
        let _ = fs::remove_file(&tmp);
    }
    written
}

/// Downloads `crate_name` at `version` through `routing`.
///
/// [`VersionSpec::Latest`] is resolved with a metadata lookup on the same
/// routing first; if that fails no download request is made. Never panics and
/// never returns an error: every failure becomes `success == false`.
pub fn probe_download(
    cfg: &HarnessConfig,
    crate_name: &str,
    version: &VersionSpec,
    routing: &Routing,
) -> ProbeResult {
    let crate_name = match validate_crate_name(crate_name) {
        Ok(name) => name,
        Err(err) => return ProbeResult::failed(err.to_string(), None, Duration::ZERO, None),
    };

    let version = match version {
        VersionSpec::Exact(v) => v.clone(),
        VersionSpec::Latest => {
            let meta = metadata::probe_metadata(cfg, crate_name, routing);
            match meta.latest_version {
                Some(v) if meta.success => v,
                _ => {
                    let reason = meta.error.unwrap_or_else(|| "no version".to_string());
                    let error = format!("could not resolve latest version: {reason}");
                    return ProbeResult::failed(error, meta.status, Duration::ZERO, None);
                }
            }
        }
    };

    let url = routing.download_url(crate_name, &version);
    tracing::info!(%url, %routing, "download probe");
    let request = routing.request(url, &cfg.user_agent, cfg.download_timeout());

    let response = match http::fetch(&request) {
        Ok(r) => r,
        Err(err) => {
            tracing::warn!(crate_name, %routing, "download failed: {}", err);
            return ProbeResult::failed(err.to_string(), None, Duration::ZERO, Some(version));
        }
    };

    if response.status != 200 {
        let err = ProbeError::http_status(response.status, &response.body, ERROR_BODY_LIMIT);
        tracing::warn!(crate_name, %routing, "download rejected: {}", err);
        return ProbeResult::failed(
            err.to_string(),
            Some(response.status),
            response.elapsed,
            Some(version),
        );
    }

    let path = cfg.artifact_dir.join(artifact_file_name(crate_name));
    if let Err(err) = write_artifact(&path, &response.body) {
        tracing::warn!(crate_name, "could not save artifact: {}", err);
        return ProbeResult::failed(
            err.to_string(),
            Some(response.status),
            response.elapsed,
            Some(version),
        );
    }

    let bytes = response.body.len() as u64;
    tracing::debug!(crate_name, bytes, path = %path.display(), "artifact saved");
    ProbeResult {
        success: true,
        status: Some(response.status),
        elapsed: response.elapsed,
        bytes,
        error: None,
        version: Some(version),
        sha256: Some(checksum::sha256_hex(&response.body)),
        artifact: Some(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_name_is_derived_from_crate() {
        assert_eq!(artifact_file_name("rand"), "test_rand.tar.gz");
        assert_eq!(artifact_file_name("serde_json"), "test_serde_json.tar.gz");
    }

    #[test]
    fn temp_path_appends_part() {
        let p = temp_path(Path::new("test_rand.tar.gz"));
        assert_eq!(p.to_string_lossy(), "test_rand.tar.gz.part");
    }

    #[test]
    fn write_artifact_creates_dir_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("test_rand.tar.gz");
        write_artifact(&path, b"crate bytes").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"crate bytes");
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn write_artifact_reports_unwritable_dir() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"").unwrap();
        let err = write_artifact(&blocker.join("test_rand.tar.gz"), b"x").unwrap_err();
        assert!(matches!(err, ProbeError::Filesystem { .. }));
    }

    #[test]
    fn failed_rename_leaves_no_part_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_rand.tar.gz");
        fs::create_dir_all(path.join("occupied")).unwrap();
        let err = write_artifact(&path, b"crate bytes").unwrap_err();
        assert!(matches!(err, ProbeError::Filesystem { .. }));
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn path_like_crate_name_is_rejected_before_any_write() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = HarnessConfig::default();
        cfg.origin_url = "http://192.0.2.1:9".to_string();
        cfg.artifact_dir = dir.path().join("artifacts");
        let routing = cfg.origin_routing(Default::default());
        let r = probe_download(
            &cfg,
            "a/../../../x",
            &VersionSpec::Exact("1.0.0".to_string()),
            &routing,
        );
        assert!(!r.success);
        assert!(r.status.is_none());
        assert!(r.error.as_deref().unwrap().contains("invalid crate name"));
        assert!(!cfg.artifact_dir.exists());
    }

    #[test]
    fn empty_crate_name_fails_without_request() {
        let mut cfg = HarnessConfig::default();
        // Unroutable on purpose: the probe must bail before touching the network.
        cfg.origin_url = "http://192.0.2.1:9".to_string();
        let routing = cfg.origin_routing(Default::default());
        let r = probe_download(&cfg, "  ", &VersionSpec::Latest, &routing);
        assert!(!r.success);
        assert!(r.status.is_none());
        assert!(r.error.as_deref().unwrap().contains("crate name"));
    }
}
