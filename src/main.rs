use std::time::Duration;

use clap::Parser;

use statpulse::cli::{Cli, Command};
use statpulse::config::parse_duration;
use statpulse::{console, dashboard, server};

const RETRY_INTERVAL: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    console::setup_console();

    let cli = Cli::parse();

    let default_level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_level.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .init();

    let config = cli.command.configuration()?;

    let code = match &cli.command {
        Command::Status { until, .. } => {
            let mut executor = config.executor(Box::new(config.console_sink()?))?;
            match until.as_deref().map(parse_duration).transpose()? {
                Some(deadline) => {
                    executor
                        .execute_until(&config.targets, deadline, RETRY_INTERVAL)
                        .await?
                }
                None => executor.execute(&config.targets).await?,
            }
        }
        Command::Dashboard { .. } => {
            dashboard::run(config).await?;
            0
        }
        Command::Server { port, .. } => {
            server::run(config, *port).await?;
            0
        }
    };

    std::process::exit(code);
}
