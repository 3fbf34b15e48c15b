use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// HTTP methods a target may be probed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
    Head,
    Patch,
}

impl Method {
    pub const ALL: [Method; 6] = [
        Method::Get,
        Method::Put,
        Method::Post,
        Method::Delete,
        Method::Head,
        Method::Patch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Patch => "PATCH",
        }
    }

    /// Exact-match recognition, used by the target line parser.
    pub fn parse(token: &str) -> Option<Method> {
        Method::ALL.iter().copied().find(|m| m.as_str() == token)
    }

    /// Expected status when none is configured: 201 for POST, 200 otherwise.
    pub fn default_status(self) -> u16 {
        match self {
            Method::Post => 201,
            _ => 200,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("target has no url: {0:?}")]
    MissingUrl(String),
    #[error("invalid url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
}

/// One configured endpoint check: URL, method, expected status, and
/// optional label, timeout, headers, and collaborator-attached metadata.
///
/// Immutable once built; a dashboard or server loop reuses the same
/// target list across many rounds.
#[derive(Debug, Clone)]
pub struct Target {
    pub label: String,
    pub method: Method,
    /// `Duration::ZERO` means no timeout.
    pub timeout: Duration,
    pub expected_status: u16,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub extra: HashMap<String, serde_json::Value>,
}

impl Target {
    /// Builds a target, defaulting the URL scheme to `http` when absent.
    pub fn new(
        label: impl Into<String>,
        url: &str,
        method: Method,
        expected_status: u16,
    ) -> Result<Target, TargetError> {
        if url.is_empty() {
            return Err(TargetError::MissingUrl(url.to_string()));
        }

        let url = if url.contains("://") {
            url.to_string()
        } else {
            format!("http://{url}")
        };

        // Validate, but keep the operator's spelling (Url::to_string
        // would append a trailing slash to a bare host).
        Url::parse(&url).map_err(|source| TargetError::InvalidUrl {
            url: url.clone(),
            source,
        })?;

        Ok(Target {
            label: label.into(),
            method,
            timeout: Duration::ZERO,
            expected_status,
            url,
            headers: HashMap::new(),
            extra: HashMap::new(),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Target {
        self.timeout = timeout;
        self
    }

    /// Attaches collaborator metadata that rides along to the report.
    pub fn add_extra(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.extra.insert(key.into(), value);
    }
}

/// Parses the compact target line language:
///
/// ```text
/// <url>[|<METHOD>][|<status>][|<label>][|{H}<Header-Name>[: <value>]]*
/// ```
///
/// The URL may be single- or double-quoted to embed literal `|`
/// characters. A METHOD token is recognized by exact match, a status
/// token by being a number in [1,599]; the first remaining non-header
/// token becomes the label. `{H}`-prefixed tokens are headers, split
/// once on the first `:`.
pub fn parse_target(spec: &str) -> Result<Target, TargetError> {
    let (url, rest) = extract_url(spec);

    let mut method: Option<Method> = None;
    let mut status: Option<u16> = None;
    let mut label = String::new();
    let mut headers = HashMap::new();

    for part in rest {
        if method.is_none() && Method::parse(part).is_some() {
            method = Method::parse(part);
        } else if status.is_none() && is_status_code(part) {
            status = part.parse().ok();
        } else if is_header(part) {
            if let Some((name, value)) = extract_header(part) {
                headers.insert(name, value);
            }
        } else if label.is_empty() {
            label = unquote(part).to_string();
        }
    }

    let method = method.unwrap_or(Method::Get);
    let status = status.unwrap_or_else(|| method.default_status());

    let mut target = Target::new(label, url, method, status)?;
    target.headers = headers;
    Ok(target)
}

/// Splits off the URL, honoring quoting, and returns the remaining
/// `|`-separated tokens.
fn extract_url(spec: &str) -> (&str, Vec<&str>) {
    for quote in ['"', '\''] {
        if let Some(body) = spec.strip_prefix(quote) {
            if let Some(end) = body.find(quote) {
                let url = &body[..end];
                let rest = &body[end + 1..];
                let rest = rest.strip_prefix('|').unwrap_or(rest);
                let parts = if rest.is_empty() {
                    Vec::new()
                } else {
                    rest.split('|').collect()
                };
                return (url, parts);
            }
        }
    }

    let mut parts = spec.split('|');
    let url = parts.next().unwrap_or_default();
    (url, parts.collect())
}

fn is_status_code(token: &str) -> bool {
    matches!(token.parse::<u16>(), Ok(code) if (1..=599).contains(&code))
}

fn is_header(token: &str) -> bool {
    token.starts_with("{H}")
}

fn extract_header(token: &str) -> Option<(String, String)> {
    let header = unquote(token.trim_start_matches("{H}"));
    match header.split_once(':') {
        Some((name, value)) => Some((name.trim().to_string(), value.trim().to_string())),
        None if !header.is_empty() => Some((header.to_string(), String::new())),
        None => None,
    }
}

fn unquote(s: &str) -> &str {
    for quote in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_defaults_to_http() {
        let t = Target::new("", "www.example.com", Method::Get, 200).unwrap();
        assert_eq!(t.url, "http://www.example.com");
    }

    #[test]
    fn explicit_scheme_is_preserved() {
        let t = Target::new("", "https://example.com", Method::Get, 200).unwrap();
        assert_eq!(t.url, "https://example.com");
    }

    #[test]
    fn empty_url_is_rejected() {
        assert!(Target::new("", "", Method::Get, 200).is_err());
    }

    #[test]
    fn parse_url_method_status() {
        let t = parse_target("www.yahoo.com|GET|202").unwrap();
        assert_eq!(t.method, Method::Get);
        assert_eq!(t.expected_status, 202);
        assert_eq!(t.label, "");
        assert_eq!(t.url, "http://www.yahoo.com");
    }

    #[test]
    fn parse_defaults() {
        let t = parse_target("www.yahoo.com").unwrap();
        assert_eq!(t.method, Method::Get);
        assert_eq!(t.expected_status, 200);
        assert!(t.headers.is_empty());
    }

    #[test]
    fn post_defaults_to_201() {
        let t = parse_target("www.yahoo.com|POST").unwrap();
        assert_eq!(t.expected_status, 201);
    }

    #[test]
    fn parse_header_token() {
        let t = parse_target("www.yahoo.com|{H}Test: Value").unwrap();
        assert_eq!(t.method, Method::Get);
        assert_eq!(t.expected_status, 200);
        assert_eq!(t.headers.get("Test").map(String::as_str), Some("Value"));
    }

    #[test]
    fn parse_multiple_headers_and_label() {
        let t = parse_target("api.example.com|POST|201|checkout|{H}X-A: 1|{H}X-B: 2").unwrap();
        assert_eq!(t.label, "checkout");
        assert_eq!(t.headers.len(), 2);
        assert_eq!(t.headers.get("X-A").map(String::as_str), Some("1"));
    }

    #[test]
    fn quoted_url_embeds_pipes() {
        let t = parse_target("\"http://example.com/a|b\"|GET|200").unwrap();
        assert_eq!(t.url, "http://example.com/a|b");
        assert_eq!(t.expected_status, 200);
    }

    #[test]
    fn quoted_label() {
        let t = parse_target("www.example.com|'my label'").unwrap();
        assert_eq!(t.label, "my label");
    }

    #[test]
    fn status_out_of_range_becomes_label() {
        let t = parse_target("www.example.com|700").unwrap();
        assert_eq!(t.expected_status, 200);
        assert_eq!(t.label, "700");
    }
}
