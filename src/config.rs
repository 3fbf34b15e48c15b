//! Runtime configuration: output format selection, target collection,
//! and assembly of the formatter/sink/executor pipeline.
//!
//! Target sources are explicit [`TargetProvider`] values constructed at
//! startup and queried in order; there is no global registry.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::executor::Executor;
use crate::output::{
    FormatModifiers, JsonFormatter, ResultFormatter, SeparatorFormatter, TemplateFormatter,
};
use crate::sink::{ConsoleSink, HttpSink, MultiSink, Sink, SlackSink};
use crate::target::{parse_target, Target, TargetError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no targets configured; pass urls as arguments or use --file")]
    NoTargets,
    #[error("invalid target {spec:?}: {source}")]
    InvalidTarget {
        spec: String,
        #[source]
        source: TargetError,
    },
    #[error("could not read target file {path:?}: {source}")]
    TargetFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid duration {0:?}, expected forms like 30s, 500ms, 2m")]
    InvalidDuration(String),
}

/// The closed set of output formats, fixed at configuration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    Tab,
    Csv,
    Json,
    /// Carries the full `template=`/`template-file=` option string.
    Template(String),
}

/// Parses a format option string such as `csv-md` or `JSON-no-color`.
///
/// The base format is matched by case-insensitive prefix; suffix
/// conventions toggle modifiers: `-md` selects markdown (and beats any
/// color request), `-no-color` and `-compact` disable pretty.
pub fn parse_format(option: &str, pretty_default: bool) -> (OutputFormat, bool, bool) {
    let upper = option.to_ascii_uppercase();

    let format = if upper.starts_with("CSV") {
        OutputFormat::Csv
    } else if upper.starts_with("JSON") {
        OutputFormat::Json
    } else if upper.starts_with("TEMPLATE") {
        OutputFormat::Template(option.to_string())
    } else {
        OutputFormat::Tab
    };

    let markdown = upper.contains("-MD");
    let pretty = if markdown || upper.contains("-NO-COLOR") || upper.contains("-COMPACT") {
        false
    } else {
        pretty_default
    };

    (format, pretty, markdown)
}

/// Parses `30s`/`500ms`/`2m`/`1h` duration strings; a bare number is
/// seconds, and `0` means no timeout.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    let parsed = if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else if let Some(hours) = s.strip_suffix('h') {
        hours
            .parse::<u64>()
            .ok()
            .map(|h| Duration::from_secs(h * 3600))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    };

    parsed.ok_or_else(|| ConfigError::InvalidDuration(s.to_string()))
}

/// A source of targets. Providers are constructed explicitly and
/// queried in order at startup.
pub trait TargetProvider {
    fn targets(&self) -> Result<Vec<Target>, ConfigError>;
}

/// Targets given directly as command-line arguments, one line-language
/// spec per argument.
pub struct ArgTargets {
    pub specs: Vec<String>,
    pub timeout: Duration,
}

impl TargetProvider for ArgTargets {
    fn targets(&self) -> Result<Vec<Target>, ConfigError> {
        self.specs
            .iter()
            .map(|spec| {
                parse_target(spec)
                    .map(|t| t.with_timeout(self.timeout))
                    .map_err(|source| ConfigError::InvalidTarget {
                        spec: spec.clone(),
                        source,
                    })
            })
            .collect()
    }
}

/// Targets loaded from a file, one line-language spec per line; blank
/// lines and `#` comments are skipped.
pub struct FileTargets {
    pub path: PathBuf,
    pub timeout: Duration,
}

impl TargetProvider for FileTargets {
    fn targets(&self) -> Result<Vec<Target>, ConfigError> {
        let content = fs::read_to_string(&self.path).map_err(|source| ConfigError::TargetFile {
            path: self.path.clone(),
            source,
        })?;

        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| {
                parse_target(line)
                    .map(|t| t.with_timeout(self.timeout))
                    .map_err(|source| ConfigError::InvalidTarget {
                        spec: line.to_string(),
                        source,
                    })
            })
            .collect()
    }
}

/// Collects targets from every provider, failing fast on the first
/// malformed spec and on an empty overall set.
pub fn collect_targets(providers: &[Box<dyn TargetProvider>]) -> Result<Vec<Target>, ConfigError> {
    let mut targets = Vec::new();
    for provider in providers {
        targets.extend(provider.targets()?);
    }
    if targets.is_empty() {
        return Err(ConfigError::NoTargets);
    }
    Ok(targets)
}

/// Everything a command needs to run rounds.
pub struct Configuration {
    pub format: OutputFormat,
    pub pretty: bool,
    pub aggregate: bool,
    pub quiet: bool,
    pub markdown: bool,
    pub failures_only: bool,
    pub changes_only: bool,
    pub workers: usize,
    pub rate: Duration,
    pub targets: Vec<Target>,
    pub slack_url: Option<String>,
    pub slack_channel: Option<String>,
    pub slack_user: Option<String>,
    pub http_url: Option<String>,
    pub http_auth: Option<String>,
}

impl Configuration {
    pub fn modifiers(&self) -> FormatModifiers {
        FormatModifiers {
            pretty: self.pretty,
            aggregate: self.aggregate,
            quiet: self.quiet,
            markdown: self.markdown,
        }
    }

    pub fn formatter(&self) -> Box<dyn ResultFormatter> {
        let modifiers = self.modifiers();
        match &self.format {
            OutputFormat::Tab => Box::new(SeparatorFormatter::tab(modifiers)),
            OutputFormat::Csv => Box::new(SeparatorFormatter::csv(modifiers)),
            OutputFormat::Json => Box::new(JsonFormatter::new(modifiers)),
            OutputFormat::Template(option) => Box::new(TemplateFormatter::from_option(option)),
        }
    }

    /// The webhook destinations enabled by configuration, if any.
    pub fn webhook_sinks(&self) -> anyhow::Result<Vec<Box<dyn Sink>>> {
        let mut sinks: Vec<Box<dyn Sink>> = Vec::new();

        if let Some(url) = &self.slack_url {
            let mut slack = SlackSink::new(url);
            if let Some(channel) = &self.slack_channel {
                slack = slack.with_channel(channel);
            }
            if let Some(user) = &self.slack_user {
                slack = slack.with_username(user);
            }
            sinks.push(Box::new(slack));
        }

        if let Some(url) = &self.http_url {
            let mut http = HttpSink::new(url)?;
            if let Some(auth) = &self.http_auth {
                http = http.with_auth(auth);
            }
            sinks.push(Box::new(http));
        }

        Ok(sinks)
    }

    /// Console plus any configured webhooks, behind one multi sink.
    pub fn console_sink(&self) -> anyhow::Result<MultiSink> {
        let mut sinks: Vec<Box<dyn Sink>> = vec![Box::new(ConsoleSink)];
        sinks.extend(self.webhook_sinks()?);
        Ok(MultiSink::new(sinks))
    }

    pub fn executor(&self, sink: Box<dyn Sink>) -> anyhow::Result<Executor> {
        Ok(Executor::new(self.formatter(), sink, self.workers)?
            .aggregate(self.aggregate)
            .only_failures(self.failures_only)
            .only_state_changes(self.changes_only))
    }
}
