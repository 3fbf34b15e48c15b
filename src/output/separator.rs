//! Separator-delimited rendering, shared by the tab and CSV formats.
//!
//! The two formats differ only in the byte between fields, so one
//! implementation carries both.

use super::{
    styled_status, AggregateResult, CheckResult, FormatModifiers, ResultFormatter, COLOR_RESET,
    COLOR_YELLOW,
};

pub struct SeparatorFormatter {
    separator: &'static str,
    modifiers: FormatModifiers,
}

impl SeparatorFormatter {
    pub fn tab(modifiers: FormatModifiers) -> SeparatorFormatter {
        SeparatorFormatter {
            separator: "\t",
            modifiers,
        }
    }

    pub fn csv(modifiers: FormatModifiers) -> SeparatorFormatter {
        SeparatorFormatter {
            separator: ",",
            modifiers,
        }
    }

    fn header_columns(&self) -> &'static [&'static str] {
        if self.modifiers.aggregate {
            &["RESULT", "COUNT"]
        } else {
            &["RESULT", "EXPECT", "ACTUAL", "LABEL", "URL"]
        }
    }
}

impl ResultFormatter for SeparatorFormatter {
    fn header(&self) -> String {
        if self.modifiers.quiet {
            return String::new();
        }

        let columns: Vec<String> = self
            .header_columns()
            .iter()
            .map(|c| {
                if self.modifiers.markdown {
                    format!("*{c}*")
                } else if self.modifiers.pretty {
                    format!("{COLOR_YELLOW}{c}{COLOR_RESET}")
                } else {
                    (*c).to_string()
                }
            })
            .collect();

        format!("{}\n", columns.join(self.separator))
    }

    fn footer(&self) -> String {
        if self.modifiers.quiet {
            String::new()
        } else {
            "\n".to_string()
        }
    }

    fn record_separator(&self) -> String {
        "\n".to_string()
    }

    fn record(&self, result: &CheckResult) -> String {
        let status = styled_status(result.status_message(), result.success, &self.modifiers);

        if self.modifiers.quiet {
            return format!("{status}{}{}", self.separator, result.url);
        }

        [
            status.as_str(),
            result.expected.as_str(),
            result.status_code_actual(),
            result.label.as_str(),
            result.url.as_str(),
        ]
        .join(self.separator)
    }

    fn aggregate_record(&self, results: &[CheckResult]) -> String {
        let agg = AggregateResult::of(results);
        let status = styled_status(agg.status_message(), agg.success, &self.modifiers);

        if self.modifiers.quiet {
            status
        } else {
            format!("{status}{}{}", self.separator, agg.count)
        }
    }
}
