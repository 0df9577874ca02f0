//! Blocking HTTP GET over libcurl.
//!
//! One easy handle per request, dropped when the request completes. Bodies are
//! buffered in memory; registry metadata and crate archives are small.

use crate::error::ProbeError;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Redirect hops followed; the origin answers downloads with a redirect to its file host.
pub const MAX_REDIRECTS: u32 = 5;

/// An immutable GET request description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    url: String,
    headers: BTreeMap<String, String>,
    timeout: Duration,
    proxy: Option<String>,
}

impl ProbeRequest {
    /// GET `url` with the given `User-Agent` and overall deadline.
    pub fn get(url: impl Into<String>, user_agent: &str, timeout: Duration) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("User-Agent".to_string(), user_agent.to_string());
        Self {
            url: url.into(),
            headers,
            timeout,
            proxy: None,
        }
    }

    /// Route through an HTTP or SOCKS5 proxy (the URL scheme selects which).
    pub fn with_proxy(mut self, proxy: Option<&str>) -> Self {
        self.proxy = proxy.map(str::to_string);
        self
    }

    /// Adds or replaces a request header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub(crate) fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }
}

/// A fully received response.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u32,
    pub body: Vec<u8>,
    /// Wall time from issuing the request to the last body byte.
    pub elapsed: Duration,
}

/// Performs the request on the current thread.
///
/// Any status code is returned as `Ok`; only transport failures are errors.
/// A deadline hit maps to [`ProbeError::Timeout`].
pub fn fetch(req: &ProbeRequest) -> Result<HttpResponse, ProbeError> {
    let mut body = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(&req.url)?;
    easy.get(true)?;
    easy.follow_location(true)?;
    easy.max_redirections(MAX_REDIRECTS)?;
    easy.timeout(req.timeout)?;
    // An empty proxy string also stops libcurl from picking one up from the environment.
    easy.proxy(req.proxy.as_deref().unwrap_or(""))?;

    let mut list = curl::easy::List::new();
    for (k, v) in req.headers() {
        list.append(&format!("{}: {}", k.trim(), v.trim()))?;
    }
    easy.http_headers(list)?;

    let start = Instant::now();
    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer
            .perform()
            .map_err(|e| classify(e, req.timeout))?;
    }
    let elapsed = start.elapsed();

    let status = easy.response_code()?;
    tracing::debug!(url = %req.url, status, bytes = body.len(), ?elapsed, "GET complete");

    Ok(HttpResponse {
        status,
        body,
        elapsed,
    })
}

fn classify(err: curl::Error, timeout: Duration) -> ProbeError {
    if err.is_operation_timedout() {
        ProbeError::Timeout(timeout)
    } else {
        ProbeError::Network(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_user_agent() {
        let req = ProbeRequest::get("http://example.com/", "agent/1.0", Duration::from_secs(10));
        assert_eq!(
            req.headers().get("User-Agent").map(String::as_str),
            Some("agent/1.0")
        );
        assert_eq!(req.timeout(), Duration::from_secs(10));
        assert!(req.proxy().is_none());
    }

    #[test]
    fn request_builders_do_not_touch_other_fields() {
        let req = ProbeRequest::get("http://example.com/", "a", Duration::from_secs(1))
            .with_proxy(Some("socks5://10.0.0.1:9050"))
            .with_header("Accept", "application/json");
        assert_eq!(req.url(), "http://example.com/");
        assert_eq!(req.proxy(), Some("socks5://10.0.0.1:9050"));
        assert_eq!(req.headers().len(), 2);
    }

    #[test]
    fn timeout_errors_are_classified() {
        let err = curl::Error::new(28); // CURLE_OPERATION_TIMEDOUT
        assert!(matches!(
            classify(err, Duration::from_secs(3)),
            ProbeError::Timeout(d) if d == Duration::from_secs(3)
        ));
        let err = curl::Error::new(7); // CURLE_COULDNT_CONNECT
        assert!(matches!(
            classify(err, Duration::from_secs(3)),
            ProbeError::Network(_)
        ));
    }
}
