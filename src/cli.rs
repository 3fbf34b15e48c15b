//! Command-line surface and its translation into a [`Configuration`].

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::config::{
    collect_targets, parse_duration, parse_format, ArgTargets, ConfigError, Configuration,
    FileTargets, TargetProvider,
};

#[derive(Debug, Parser)]
#[command(name = "statpulse", version, about = "API status reporting tool")]
pub struct Cli {
    /// Enable debug logging.
    #[arg(long, short, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Probe every target once and print the results.
    Status {
        #[command(flatten)]
        common: CommonOpts,

        /// Keep retrying the whole round every 2s until it succeeds or
        /// this much time has passed, e.g. 1m.
        #[arg(long)]
        until: Option<String>,
    },
    /// Refreshing console dashboard.
    Dashboard {
        #[command(flatten)]
        common: CommonOpts,

        /// Refresh rate, e.g. 30s.
        #[arg(long, short, default_value = "30s")]
        rate: String,

        /// Report every round in full instead of only state changes.
        #[arg(long)]
        full: bool,
    },
    /// Serve cached results over HTTP at /data.
    Server {
        #[command(flatten)]
        common: CommonOpts,

        /// Listen port.
        #[arg(long, short = 'P')]
        port: u16,

        /// Cache refresh rate, e.g. 30s.
        #[arg(long, short, default_value = "30s")]
        rate: String,
    },
}

impl Command {
    /// Builds the runtime configuration, applying per-command defaults.
    /// The dashboard reports only state changes unless `--full` asks
    /// for every round.
    pub fn configuration(&self) -> Result<Configuration, ConfigError> {
        match self {
            Command::Status { common, .. } => common.configuration(Duration::ZERO),
            Command::Dashboard { common, rate, full } => {
                let mut config = common.configuration(parse_duration(rate)?)?;
                if !*full {
                    config.changes_only = true;
                }
                Ok(config)
            }
            Command::Server { common, rate, .. } => common.configuration(parse_duration(rate)?),
        }
    }
}

#[derive(Debug, Args)]
pub struct CommonOpts {
    /// Targets in `<url>[|METHOD][|status][|label][|{H}Name: value]` form.
    pub targets: Vec<String>,

    /// File with one target spec per line (# comments allowed).
    #[arg(long, short)]
    pub file: Option<PathBuf>,

    /// Output format: tab, csv, json, template=..., template-file=...;
    /// suffixes -md, -no-color, -compact tweak styling (e.g. csv-md).
    #[arg(long, default_value = "tab")]
    pub format: String,

    /// Color the output.
    #[arg(long, short)]
    pub pretty: bool,

    /// Collapse the round into a single summary record.
    #[arg(long, short)]
    pub aggregate: bool,

    /// Trim records to the status (and url); drops headers.
    #[arg(long, short)]
    pub quiet: bool,

    /// Report failing targets only.
    #[arg(long)]
    pub failures_only: bool,

    /// Report only targets whose state changed since the last round.
    #[arg(long)]
    pub changes_only: bool,

    /// Concurrent probe limit.
    #[arg(long, short, default_value_t = 1)]
    pub workers: usize,

    /// Per-target timeout, e.g. 5s; 0 = no timeout.
    #[arg(long, short, default_value = "0")]
    pub timeout: String,

    /// Slack incoming-webhook url to deliver each round to.
    #[arg(long)]
    pub slack_url: Option<String>,

    #[arg(long, requires = "slack_url")]
    pub slack_channel: Option<String>,

    #[arg(long, requires = "slack_url")]
    pub slack_user: Option<String>,

    /// HTTP callback url to deliver each round to.
    #[arg(long)]
    pub http_url: Option<String>,

    #[arg(long, requires = "http_url")]
    pub http_auth: Option<String>,
}

impl CommonOpts {
    /// Builds the runtime configuration, collecting targets from the
    /// explicit provider list (arguments, then file). Fails fast on
    /// malformed specs, bad durations, or an empty target set.
    pub fn configuration(&self, rate: Duration) -> Result<Configuration, ConfigError> {
        let timeout = parse_duration(&self.timeout)?;

        let mut providers: Vec<Box<dyn TargetProvider>> = vec![Box::new(ArgTargets {
            specs: self.targets.clone(),
            timeout,
        })];
        if let Some(path) = &self.file {
            providers.push(Box::new(FileTargets {
                path: path.clone(),
                timeout,
            }));
        }
        let targets = collect_targets(&providers)?;

        let (format, pretty, markdown) = parse_format(&self.format, self.pretty);

        Ok(Configuration {
            format,
            pretty,
            aggregate: self.aggregate,
            quiet: self.quiet,
            markdown,
            failures_only: self.failures_only,
            changes_only: self.changes_only,
            workers: self.workers,
            rate,
            targets,
            slack_url: self.slack_url.clone(),
            slack_channel: self.slack_channel.clone(),
            slack_user: self.slack_user.clone(),
            http_url: self.http_url.clone(),
            http_auth: self.http_auth.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn status_with_targets_builds_configuration() {
        let cli = parse(&[
            "statpulse",
            "status",
            "--format",
            "csv-md",
            "-w",
            "4",
            "www.example.com|GET|200",
        ]);
        let Command::Status { common, .. } = cli.command else {
            panic!("expected status command");
        };

        let config = common.configuration(Duration::from_secs(30)).unwrap();
        assert_eq!(config.format, OutputFormat::Csv);
        assert!(config.markdown);
        assert_eq!(config.workers, 4);
        assert_eq!(config.targets.len(), 1);
    }

    #[test]
    fn no_targets_is_a_configuration_error() {
        let cli = parse(&["statpulse", "status"]);
        let Command::Status { common, .. } = cli.command else {
            panic!("expected status command");
        };
        assert!(matches!(
            common.configuration(Duration::from_secs(30)),
            Err(ConfigError::NoTargets)
        ));
    }

    #[test]
    fn dashboard_defaults_to_changes_only() {
        let cli = parse(&["statpulse", "dashboard", "www.example.com"]);
        let config = cli.command.configuration().unwrap();
        assert!(config.changes_only);
        assert_eq!(config.rate, Duration::from_secs(30));
    }

    #[test]
    fn dashboard_full_reports_every_round() {
        let cli = parse(&["statpulse", "dashboard", "--full", "www.example.com"]);
        assert!(!cli.command.configuration().unwrap().changes_only);
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let cli = parse(&[
            "statpulse",
            "status",
            "--timeout",
            "soon",
            "www.example.com",
        ]);
        let Command::Status { common, .. } = cli.command else {
            panic!("expected status command");
        };
        assert!(matches!(
            common.configuration(Duration::from_secs(30)),
            Err(ConfigError::InvalidDuration(_))
        ));
    }
}
