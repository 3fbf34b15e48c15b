//! User-supplied template rendering over the result fields.
//!
//! The format option carries either the template text itself
//! (`template=...`) or a file reference (`template-file=...`). Fields
//! unknown to the template context render as empty, and render failures
//! degrade to an empty record; operators are expected to validate
//! templates out-of-band.

use minijinja::{Environment, UndefinedBehavior, Value};
use serde::Serialize;
use tracing::warn;

use super::{AggregateResult, CheckResult, ResultFormatter};

pub struct TemplateFormatter {
    environment: Option<Environment<'static>>,
}

const TEMPLATE_NAME: &str = "record";

impl TemplateFormatter {
    /// Builds a formatter from a `template=`/`template-file=` option
    /// string. An unusable option yields a formatter that renders
    /// nothing, mirroring the fail-soft rendering contract.
    pub fn from_option(option: &str) -> TemplateFormatter {
        let source = match extract_source(option) {
            Some(source) => source,
            None => {
                warn!(option, "could not extract template from format option");
                return TemplateFormatter { environment: None };
            }
        };

        let mut environment = Environment::new();
        environment.set_undefined_behavior(UndefinedBehavior::Lenient);
        let environment = match environment.add_template_owned(TEMPLATE_NAME, source) {
            Ok(()) => Some(environment),
            Err(err) => {
                warn!(%err, option, "could not parse template");
                None
            }
        };

        TemplateFormatter { environment }
    }

    fn render<T: Serialize>(&self, context: &T) -> String {
        let Some(environment) = &self.environment else {
            return String::new();
        };
        // add_template_owned succeeded, the template is present.
        let template = match environment.get_template(TEMPLATE_NAME) {
            Ok(template) => template,
            Err(_) => return String::new(),
        };
        template
            .render(Value::from_serialize(context))
            .unwrap_or_else(|err| {
                warn!(%err, "template rendering failed");
                String::new()
            })
    }
}

fn extract_source(option: &str) -> Option<String> {
    let (key, value) = option.split_once('=')?;
    match key.to_ascii_lowercase().as_str() {
        "template" => Some(value.to_string()),
        "template-file" => match std::fs::read_to_string(value) {
            Ok(source) => Some(source),
            Err(err) => {
                warn!(%err, file = value, "could not read template file");
                None
            }
        },
        _ => None,
    }
}

impl ResultFormatter for TemplateFormatter {
    fn header(&self) -> String {
        String::new()
    }

    fn footer(&self) -> String {
        String::new()
    }

    fn record_separator(&self) -> String {
        "\n".to_string()
    }

    fn record(&self, result: &CheckResult) -> String {
        self.render(result)
    }

    fn aggregate_record(&self, results: &[CheckResult]) -> String {
        self.render(&AggregateResult::of(results))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_result;
    use super::*;

    #[test]
    fn renders_result_fields() {
        let f = TemplateFormatter::from_option("template={{ url }} -> {{ actual }}");
        assert_eq!(
            f.record(&test_result(true, None)),
            "http://example.com -> 200"
        );
    }

    #[test]
    fn unknown_fields_render_empty() {
        let f = TemplateFormatter::from_option("template=[{{ nonsense }}]");
        assert_eq!(f.record(&test_result(true, None)), "[]");
    }

    #[test]
    fn malformed_option_renders_nothing() {
        let f = TemplateFormatter::from_option("no-equals-sign");
        assert_eq!(f.record(&test_result(true, None)), "");
    }

    #[test]
    fn malformed_template_renders_nothing() {
        let f = TemplateFormatter::from_option("template={{ unclosed");
        assert_eq!(f.record(&test_result(true, None)), "");
    }

    #[test]
    fn aggregate_context_has_ok_and_count() {
        let f = TemplateFormatter::from_option("template={{ ok }}/{{ count }}");
        let results = vec![test_result(true, None), test_result(false, None)];
        assert_eq!(f.aggregate_record(&results), "false/2");
    }
}
