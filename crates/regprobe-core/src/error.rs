//! Probe error taxonomy.
//!
//! Every probe converts these into its result type (success flag plus a
//! description) before returning, so none of them cross an operation boundary.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single probe step (network, parse, filesystem or subprocess).
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Caller-supplied input rejected before any I/O.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The request did not complete within its deadline.
    #[error("request timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),
    /// libcurl reported a connection-level failure.
    #[error("network error: {0}")]
    Network(#[from] curl::Error),
    /// A response was received but its status was not the expected one.
    #[error("HTTP {status}: {excerpt}")]
    HttpStatus { status: u32, excerpt: String },
    /// The response body could not be interpreted.
    #[error("malformed response: {0}")]
    Parse(String),
    /// Reading or writing a local file failed.
    #[error("{}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The external build tool could not be run.
    #[error("subprocess: {0}")]
    Subprocess(String),
}

impl ProbeError {
    pub(crate) fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ProbeError::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Builds an `HttpStatus` error from a raw body, keeping the first `limit` characters.
    pub(crate) fn http_status(status: u32, body: &[u8], limit: usize) -> Self {
        let text = String::from_utf8_lossy(body);
        let excerpt = excerpt(text.trim(), limit);
        ProbeError::HttpStatus {
            status,
            excerpt: if excerpt.is_empty() {
                "(empty body)".to_string()
            } else {
                excerpt
            },
        }
    }
}

/// First `limit` characters of `s` (character-, not byte-based).
pub fn excerpt(s: &str, limit: usize) -> String {
    s.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_counts_characters_not_bytes() {
        assert_eq!(excerpt("héllo", 2), "hé");
        assert_eq!(excerpt("abc", 10), "abc");
        assert_eq!(excerpt("", 5), "");
    }

    #[test]
    fn http_status_truncates_body() {
        let body = "x".repeat(500);
        match ProbeError::http_status(502, body.as_bytes(), 200) {
            ProbeError::HttpStatus { status, excerpt } => {
                assert_eq!(status, 502);
                assert_eq!(excerpt.len(), 200);
            }
            other => panic!("expected HttpStatus, got {other:?}"),
        }
    }

    #[test]
    fn http_status_empty_body_still_describes() {
        let err = ProbeError::http_status(404, b"", 200);
        assert_eq!(err.to_string(), "HTTP 404: (empty body)");
    }

    #[test]
    fn timeout_message_mentions_deadline() {
        let err = ProbeError::Timeout(Duration::from_secs(10));
        assert_eq!(err.to_string(), "request timed out after 10s");
    }
}
