//! Single-target HTTP probe.
//!
//! A probe issues one request and records the status code it saw, or the
//! transport error that prevented a response. Whether the outcome counts
//! as a success is decided by [`ProbeResult::success`], not by the
//! prober; a completed round trip with the "wrong" status is still a
//! completed round trip.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_ENCODING, CONTENT_TYPE};
use tracing::{debug, warn};

use crate::target::{Method, Target};

/// Connection establishment cap, independent of the per-target timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of probing one target.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub url: String,
    pub method: Method,
    pub expected: u16,
    /// Status code of the response, or `None` if the request failed
    /// before a response was obtained.
    pub actual: Option<u16>,
    /// Transport-level failure: DNS, connection refused, TLS, timeout.
    pub error: Option<String>,
}

impl ProbeResult {
    pub fn success(&self) -> bool {
        self.error.is_none() && self.actual == Some(self.expected)
    }
}

/// Issues probes over a shared client.
///
/// # Security
///
/// TLS certificate verification is **disabled** on this client. This is
/// a deliberate trade-off, not a bug: the tool is routinely pointed at
/// internal endpoints with self-signed certificates, and a status check
/// that refuses to speak to them is useless. Do not reuse this client
/// for anything that carries credentials.
#[derive(Clone)]
pub struct Prober {
    client: reqwest::Client,
}

impl Prober {
    pub fn new() -> anyhow::Result<Prober> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate"));

        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .connect_timeout(CONNECT_TIMEOUT)
            .default_headers(headers)
            .build()?;

        Ok(Prober { client })
    }

    /// Probes one target. Never retries; the caller owns retry policy.
    /// The response body is discarded unread, only the status matters.
    pub async fn probe(&self, target: &Target) -> ProbeResult {
        let method = match target.method {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
            Method::Head => reqwest::Method::HEAD,
            Method::Patch => reqwest::Method::PATCH,
        };

        let mut request = self.client.request(method, &target.url);
        if !target.timeout.is_zero() {
            request = request.timeout(target.timeout);
        }
        for (name, value) in &target.headers {
            match (name.parse::<HeaderName>(), value.parse::<HeaderValue>()) {
                (Ok(name), Ok(value)) => request = request.header(name, value),
                _ => warn!(header = %name, url = %target.url, "skipping malformed header"),
            }
        }

        let (actual, error) = match request.send().await {
            Ok(response) => (Some(response.status().as_u16()), None),
            Err(err) => (None, Some(err.to_string())),
        };

        debug!(
            url = %target.url,
            method = %target.method,
            expected = target.expected_status,
            actual = ?actual,
            error = ?error,
            "probe completed"
        );

        ProbeResult {
            url: target.url.clone(),
            method: target.method,
            expected: target.expected_status,
            actual,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(expected: u16, actual: Option<u16>, error: Option<&str>) -> ProbeResult {
        ProbeResult {
            url: "http://example.com".into(),
            method: Method::Get,
            expected,
            actual,
            error: error.map(String::from),
        }
    }

    #[test]
    fn matching_status_is_success() {
        assert!(result(200, Some(200), None).success());
    }

    #[test]
    fn mismatched_status_is_failure() {
        assert!(!result(200, Some(404), None).success());
    }

    #[test]
    fn error_is_failure_regardless_of_actual() {
        assert!(!result(200, Some(200), Some("timeout")).success());
        assert!(!result(200, None, Some("connection refused")).success());
    }

    #[tokio::test]
    async fn malformed_header_is_skipped_not_fatal() {
        use std::future::IntoFuture;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app =
            axum::Router::new().fallback(|| async { axum::http::StatusCode::OK });
        tokio::spawn(axum::serve(listener, app).into_future());

        let mut target = Target::new("", &addr.to_string(), Method::Get, 200).unwrap();
        target.headers.insert("bad header".into(), "1".into());
        target.headers.insert("X-Good".into(), "1".into());

        let result = Prober::new().unwrap().probe(&target).await;
        assert!(result.success());
    }
}
