//! JSON rendering: an array of record objects, or a single object in
//! aggregate mode.

use serde::Serialize;
use tracing::warn;

use super::{AggregateResult, CheckResult, FormatModifiers, ResultFormatter};

pub struct JsonFormatter {
    modifiers: FormatModifiers,
}

#[derive(Serialize)]
struct QuietRecord<'a> {
    ok: bool,
    #[serde(skip_serializing_if = "str::is_empty")]
    url: &'a str,
}

#[derive(Serialize)]
struct QuietAggregate {
    ok: bool,
}

impl JsonFormatter {
    pub fn new(modifiers: FormatModifiers) -> JsonFormatter {
        JsonFormatter { modifiers }
    }

    /// Rendering failures degrade to an empty record rather than
    /// aborting the round.
    fn render<T: Serialize>(&self, value: &T) -> String {
        let rendered = if self.modifiers.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|err| {
            warn!(%err, "could not render result as json");
            String::new()
        })
    }
}

impl ResultFormatter for JsonFormatter {
    fn header(&self) -> String {
        if self.modifiers.aggregate {
            String::new()
        } else if self.modifiers.pretty {
            "[\n".to_string()
        } else {
            "[".to_string()
        }
    }

    fn footer(&self) -> String {
        if self.modifiers.aggregate {
            "\n".to_string()
        } else if self.modifiers.pretty {
            "\n]\n".to_string()
        } else {
            "]\n".to_string()
        }
    }

    fn record_separator(&self) -> String {
        ",".to_string()
    }

    fn record(&self, result: &CheckResult) -> String {
        if self.modifiers.quiet {
            self.render(&QuietRecord {
                ok: result.success,
                url: &result.url,
            })
        } else {
            self.render(result)
        }
    }

    fn aggregate_record(&self, results: &[CheckResult]) -> String {
        let agg = AggregateResult::of(results);
        if self.modifiers.quiet {
            self.render(&QuietAggregate { ok: agg.success })
        } else {
            self.render(&agg)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_result;
    use super::*;

    #[test]
    fn record_serializes_report_fields() {
        let f = JsonFormatter::new(FormatModifiers::default());
        let rendered = f.record(&test_result(false, None));
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["ok"], false);
        assert_eq!(value["expectation"], "200");
        assert_eq!(value["actual"], "500");
        assert_eq!(value["url"], "http://example.com");
        assert_eq!(value["label"], "api");
    }

    #[test]
    fn failed_probe_omits_actual() {
        let f = JsonFormatter::new(FormatModifiers::default());
        let value: serde_json::Value =
            serde_json::from_str(&f.record(&test_result(false, Some("refused")))).unwrap();
        assert!(value.get("actual").is_none());
        assert_eq!(value["error"], "refused");
    }

    #[test]
    fn quiet_record_is_ok_and_url_only() {
        let f = JsonFormatter::new(FormatModifiers {
            quiet: true,
            ..Default::default()
        });
        assert_eq!(
            f.record(&test_result(true, None)),
            r#"{"ok":true,"url":"http://example.com"}"#
        );
    }

    #[test]
    fn array_brackets_in_record_mode() {
        let f = JsonFormatter::new(FormatModifiers::default());
        assert_eq!(f.header(), "[");
        assert_eq!(f.footer(), "]\n");
        assert_eq!(f.record_separator(), ",");
    }

    #[test]
    fn aggregate_mode_drops_brackets() {
        let f = JsonFormatter::new(FormatModifiers {
            aggregate: true,
            ..Default::default()
        });
        assert_eq!(f.header(), "");
        assert_eq!(f.footer(), "\n");
        let results = vec![test_result(true, None)];
        assert_eq!(f.aggregate_record(&results), r#"{"ok":true,"count":1}"#);
    }
}
