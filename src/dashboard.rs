//! Looping console dashboard: clear the screen, print a timestamp
//! header, run one round, repeat on the configured rate until ctrl-c.

use chrono::Utc;

use crate::config::Configuration;
use crate::output::{COLOR_RESET, COLOR_YELLOW};
use crate::sink::Sink;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

pub async fn run(config: Configuration) -> anyhow::Result<()> {
    let mut executor = config.executor(Box::new(config.console_sink()?))?;

    let mut ticker =
        tokio::time::interval(config.rate.max(std::time::Duration::from_secs(1)));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let mut console = crate::sink::ConsoleSink;
                console.write(frame_header(&config).as_bytes()).await?;
                executor.execute(&config.targets).await?;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                return Ok(());
            }
        }
    }
}

fn frame_header(config: &Configuration) -> String {
    let mut header = String::from(CLEAR_SCREEN);
    if !config.quiet {
        let now = Utc::now().to_rfc2822();
        if config.pretty {
            header.push_str(&format!("{COLOR_YELLOW}{now}{COLOR_RESET}\n"));
        } else {
            header.push_str(&format!("{now}\n"));
        }
    }
    header
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;

    fn config(quiet: bool, pretty: bool) -> Configuration {
        Configuration {
            format: OutputFormat::Tab,
            pretty,
            aggregate: false,
            quiet,
            markdown: false,
            failures_only: false,
            changes_only: false,
            workers: 1,
            rate: std::time::Duration::from_secs(30),
            targets: Vec::new(),
            slack_url: None,
            slack_channel: None,
            slack_user: None,
            http_url: None,
            http_auth: None,
        }
    }

    #[test]
    fn quiet_frame_is_clear_codes_only() {
        assert_eq!(frame_header(&config(true, false)), CLEAR_SCREEN);
    }

    #[test]
    fn pretty_frame_colors_the_timestamp() {
        let header = frame_header(&config(false, true));
        assert!(header.starts_with(CLEAR_SCREEN));
        assert!(header.contains(COLOR_YELLOW));
        assert!(header.ends_with("\n"));
    }
}
