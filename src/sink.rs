//! Output destinations.
//!
//! A round's formatted bytes flow into a [`Sink`]. The console sink
//! writes through immediately; the webhook sinks buffer everything and
//! deliver in a single request on close, so a round maps to at most one
//! outbound notification. The multi sink duplicates writes across all
//! enabled destinations.

use std::io::Write;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

/// A writable, closable destination for a round's output.
///
/// Close finalizes destinations that buffer (webhooks publish, the
/// server cache swaps in the new snapshot); it is called once per round
/// unless the executor runs with autoclose disabled.
#[async_trait]
pub trait Sink: Send {
    async fn write(&mut self, bytes: &[u8]) -> anyhow::Result<()>;
    async fn close(&mut self) -> anyhow::Result<()>;
}

/// Standard output. Closing a process's stdout is never desired, so
/// close only flushes.
#[derive(Default)]
pub struct ConsoleSink;

#[async_trait]
impl Sink for ConsoleSink {
    async fn write(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(bytes)?;
        Ok(())
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        std::io::stdout().lock().flush()?;
        Ok(())
    }
}

/// Generic HTTP callback: buffers all written bytes and performs one
/// request on close. Closing with an empty buffer is a no-op.
pub struct HttpSink {
    url: String,
    method: reqwest::Method,
    auth: Option<String>,
    client: reqwest::Client,
    buffer: Vec<u8>,
}

impl HttpSink {
    pub fn new(url: impl Into<String>) -> anyhow::Result<HttpSink> {
        // Same trade-off as the prober: internal endpoints with
        // self-signed certificates must be reachable.
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(HttpSink {
            url: url.into(),
            method: reqwest::Method::POST,
            auth: None,
            client,
            buffer: Vec::new(),
        })
    }

    pub fn with_method(mut self, method: reqwest::Method) -> HttpSink {
        self.method = method;
        self
    }

    pub fn with_auth(mut self, auth: impl Into<String>) -> HttpSink {
        self.auth = Some(auth.into());
        self
    }
}

#[async_trait]
impl Sink for HttpSink {
    async fn write(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        if self.buffer.is_empty() {
            debug!(url = %self.url, "http sink has no content, skipping delivery");
            return Ok(());
        }

        let body = std::mem::take(&mut self.buffer);
        let mut request = self
            .client
            .request(self.method.clone(), &self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(auth) = &self.auth {
            request = request.header(reqwest::header::AUTHORIZATION, auth.clone());
        }

        request.send().await?;
        Ok(())
    }
}

const DEFAULT_SLACK_CHANNEL: &str = "#general";
const DEFAULT_SLACK_USER: &str = "statpulse";
const DEFAULT_SLACK_ICON: &str =
    "https://www.dropbox.com/s/uolw04kx70jjroi/StatusIndicator.png?dl=1";

#[derive(Serialize)]
struct SlackPayload<'a> {
    channel: &'a str,
    username: &'a str,
    text: &'a str,
    icon_url: &'a str,
}

/// Slack incoming-webhook destination: buffers the round's output and
/// posts it as one message on close.
pub struct SlackSink {
    url: String,
    channel: String,
    username: String,
    icon_url: String,
    client: reqwest::Client,
    buffer: Vec<u8>,
}

impl SlackSink {
    pub fn new(url: impl Into<String>) -> SlackSink {
        SlackSink {
            url: url.into(),
            channel: DEFAULT_SLACK_CHANNEL.to_string(),
            username: DEFAULT_SLACK_USER.to_string(),
            icon_url: DEFAULT_SLACK_ICON.to_string(),
            client: reqwest::Client::new(),
            buffer: Vec::new(),
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> SlackSink {
        self.channel = channel.into();
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> SlackSink {
        self.username = username.into();
        self
    }

    pub fn with_icon_url(mut self, icon_url: impl Into<String>) -> SlackSink {
        self.icon_url = icon_url.into();
        self
    }
}

#[async_trait]
impl Sink for SlackSink {
    async fn write(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        if self.buffer.is_empty() {
            debug!(url = %self.url, "slack sink has no content, skipping delivery");
            return Ok(());
        }

        let text = String::from_utf8_lossy(&self.buffer).into_owned();
        let payload = SlackPayload {
            channel: &self.channel,
            username: &self.username,
            text: &text,
            icon_url: &self.icon_url,
        };

        self.client.post(&self.url).json(&payload).send().await?;
        self.buffer.clear();
        Ok(())
    }
}

/// Fans every write out to all destinations.
///
/// Delivery policy: best effort. Every destination is attempted on
/// both write and close; the first error encountered is returned after
/// all attempts, so one failing webhook cannot starve the console.
#[derive(Default)]
pub struct MultiSink {
    sinks: Vec<Box<dyn Sink>>,
}

impl MultiSink {
    pub fn new(sinks: Vec<Box<dyn Sink>>) -> MultiSink {
        MultiSink { sinks }
    }

    pub fn push(&mut self, sink: Box<dyn Sink>) {
        self.sinks.push(sink);
    }
}

#[async_trait]
impl Sink for MultiSink {
    async fn write(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        let mut first_error = None;
        for sink in &mut self.sinks {
            if let Err(err) = sink.write(bytes).await {
                warn!(%err, "sink write failed");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        let mut first_error = None;
        for sink in &mut self.sinks {
            if let Err(err) = sink.close().await {
                warn!(%err, "sink close failed");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Captures writes in memory and counts closes.
    #[derive(Clone, Default)]
    pub struct MemorySink {
        pub contents: Arc<Mutex<Vec<u8>>>,
        pub closes: Arc<Mutex<usize>>,
    }

    impl MemorySink {
        pub fn text(&self) -> String {
            String::from_utf8_lossy(&self.contents.lock().unwrap()).into_owned()
        }

        pub fn clear(&self) {
            self.contents.lock().unwrap().clear();
        }
    }

    #[async_trait]
    impl Sink for MemorySink {
        async fn write(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
            self.contents.lock().unwrap().extend_from_slice(bytes);
            Ok(())
        }

        async fn close(&mut self) -> anyhow::Result<()> {
            *self.closes.lock().unwrap() += 1;
            Ok(())
        }
    }

    /// Always fails, for multi-sink policy tests.
    pub struct FailingSink;

    #[async_trait]
    impl Sink for FailingSink {
        async fn write(&mut self, _bytes: &[u8]) -> anyhow::Result<()> {
            anyhow::bail!("write refused")
        }

        async fn close(&mut self) -> anyhow::Result<()> {
            anyhow::bail!("close refused")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{FailingSink, MemorySink};
    use super::*;

    #[tokio::test]
    async fn multi_sink_duplicates_writes() {
        let a = MemorySink::default();
        let b = MemorySink::default();
        let mut multi = MultiSink::new(vec![Box::new(a.clone()), Box::new(b.clone())]);

        multi.write(b"hello").await.unwrap();
        multi.close().await.unwrap();

        assert_eq!(a.text(), "hello");
        assert_eq!(b.text(), "hello");
        assert_eq!(*a.closes.lock().unwrap(), 1);
        assert_eq!(*b.closes.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn failing_destination_does_not_starve_others() {
        let healthy = MemorySink::default();
        let mut multi = MultiSink::new(vec![Box::new(FailingSink), Box::new(healthy.clone())]);

        let result = multi.write(b"payload").await;
        assert!(result.is_err());
        assert_eq!(healthy.text(), "payload");
    }

    #[tokio::test]
    async fn close_attempts_every_destination() {
        let healthy = MemorySink::default();
        let mut multi = MultiSink::new(vec![Box::new(FailingSink), Box::new(healthy.clone())]);

        assert!(multi.close().await.is_err());
        assert_eq!(*healthy.closes.lock().unwrap(), 1);
    }
}
