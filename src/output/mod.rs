//! Reporting-facing result types and the pluggable formatter contract.
//!
//! Every probe becomes exactly one [`CheckResult`]. A formatter renders
//! results into a byte format (tab, CSV, JSON, or a user template); the
//! executor drives the header/record/separator/footer sequencing.

mod json;
mod separator;
mod template;

pub use json::JsonFormatter;
pub use separator::SeparatorFormatter;
pub use template::TemplateFormatter;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::probe::ProbeResult;

pub const STATUS_OK: &str = "[ok]";
pub const STATUS_NOT_OK: &str = "[!ok]";
pub const STATUS_ERROR: &str = "[err]";

/// Sentinel rendered when no HTTP response was obtained.
pub const STATUS_CODE_NA: &str = "n/a";

pub(crate) const COLOR_GREEN: &str = "\x1b[1;32m";
pub(crate) const COLOR_RED: &str = "\x1b[1;31m";
pub(crate) const COLOR_YELLOW: &str = "\x1b[1;33m";
pub(crate) const COLOR_RESET: &str = "\x1b[0m";

/// One target's outcome, shaped for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    #[serde(rename = "ok")]
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "expectation", skip_serializing_if = "String::is_empty")]
    pub expected: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub label: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub timestamp: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, serde_json::Value>,
}

impl CheckResult {
    pub fn from_probe(probe: &ProbeResult, label: &str, at: DateTime<Utc>) -> CheckResult {
        CheckResult {
            success: probe.success(),
            error: probe.error.clone(),
            expected: probe.expected.to_string(),
            actual: probe.actual.map(|code| code.to_string()),
            url: probe.url.clone(),
            label: label.to_string(),
            timestamp: at.to_rfc3339(),
            extra: HashMap::new(),
        }
    }

    /// Error beats status mismatch; status mismatch beats success.
    pub fn status_message(&self) -> &'static str {
        if self.success {
            STATUS_OK
        } else if self.error.is_some() {
            STATUS_ERROR
        } else {
            STATUS_NOT_OK
        }
    }

    pub fn status_code_actual(&self) -> &str {
        self.actual.as_deref().unwrap_or(STATUS_CODE_NA)
    }
}

/// Per-round summary: AND of all member successes, plus a count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AggregateResult {
    #[serde(rename = "ok")]
    pub success: bool,
    pub count: usize,
}

impl AggregateResult {
    pub fn of(results: &[CheckResult]) -> AggregateResult {
        AggregateResult {
            success: results.iter().all(|r| r.success),
            count: results.len(),
        }
    }

    pub fn status_message(&self) -> &'static str {
        if self.success {
            STATUS_OK
        } else {
            STATUS_NOT_OK
        }
    }
}

/// Output-mode switches shared by every formatter.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatModifiers {
    /// ANSI-color the status token and header.
    pub pretty: bool,
    /// The round renders one aggregate record instead of per-target records.
    pub aggregate: bool,
    /// Trim records to status (+url) and drop header/footer.
    pub quiet: bool,
    /// Wrap status tokens in `*…*`; suppresses pretty.
    pub markdown: bool,
}

/// Rendering strategy over a closed set of formats, selected once at
/// configuration time.
///
/// Sequencing contract (driven by the executor): `header` once before
/// the first record, `record_separator` between consecutive records,
/// `footer` once after the last record; none of them when a round emits
/// zero records.
pub trait ResultFormatter: Send + Sync {
    fn header(&self) -> String;
    fn footer(&self) -> String;
    fn record_separator(&self) -> String;
    fn record(&self, result: &CheckResult) -> String;
    fn aggregate_record(&self, results: &[CheckResult]) -> String;
}

/// Colors or wraps a status token per the active modifiers.
pub(crate) fn styled_status(token: &str, success: bool, modifiers: &FormatModifiers) -> String {
    if modifiers.markdown {
        format!("*{token}*")
    } else if modifiers.pretty {
        let color = if success { COLOR_GREEN } else { COLOR_RED };
        format!("{color}{token}{COLOR_RESET}")
    } else {
        token.to_string()
    }
}

#[cfg(test)]
pub(crate) fn test_result(success: bool, error: Option<&str>) -> CheckResult {
    CheckResult {
        success,
        error: error.map(String::from),
        expected: "200".into(),
        actual: if error.is_some() {
            None
        } else if success {
            Some("200".into())
        } else {
            Some("500".into())
        },
        url: "http://example.com".into(),
        label: "api".into(),
        timestamp: String::new(),
        extra: HashMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_message_precedence() {
        assert_eq!(test_result(true, None).status_message(), STATUS_OK);
        assert_eq!(test_result(false, None).status_message(), STATUS_NOT_OK);
        assert_eq!(
            test_result(false, Some("dns failure")).status_message(),
            STATUS_ERROR
        );
    }

    #[test]
    fn actual_falls_back_to_sentinel() {
        assert_eq!(test_result(false, Some("refused")).status_code_actual(), "n/a");
        assert_eq!(test_result(true, None).status_code_actual(), "200");
    }

    #[test]
    fn aggregate_is_and_of_members() {
        let all_ok = vec![test_result(true, None), test_result(true, None)];
        assert!(AggregateResult::of(&all_ok).success);
        assert_eq!(AggregateResult::of(&all_ok).count, 2);

        let one_bad = vec![test_result(true, None), test_result(false, None)];
        assert!(!AggregateResult::of(&one_bad).success);
    }

    #[test]
    fn aggregate_of_empty_is_success() {
        assert!(AggregateResult::of(&[]).success);
        assert_eq!(AggregateResult::of(&[]).count, 0);
    }

    #[test]
    fn markdown_suppresses_pretty() {
        let m = FormatModifiers {
            markdown: true,
            pretty: true,
            ..Default::default()
        };
        assert_eq!(styled_status(STATUS_OK, true, &m), "*[ok]*");
    }
}
