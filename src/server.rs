//! HTTP server mode: serve the most recently cached round at `/data`
//! while a background ticker keeps the cache fresh.
//!
//! The executor writes each round into a [`CacheSink`]; closing the
//! sink atomically publishes the round's bytes as the response body.
//! Readers take the lock only long enough to clone the snapshot, so a
//! slow client never blocks a refresh.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::sync::RwLock;
use tower_http::services::ServeDir;
use tracing::{error, info};

use crate::config::{Configuration, OutputFormat};
use crate::sink::{MultiSink, Sink};

const NO_FAILURES_JSON: &str = r#"{"message":"no failures"}"#;
const NO_FAILURES_TEXT: &str = "no failures";

type Snapshot = Arc<RwLock<Option<Vec<u8>>>>;

/// Buffers one round and publishes it as the cached `/data` body on
/// close. A round that produced no output publishes a fixed
/// "no failures" body instead, so filtered-silent rounds still refresh
/// the cache.
pub struct CacheSink {
    buffer: Vec<u8>,
    snapshot: Snapshot,
    empty_body: &'static str,
}

impl CacheSink {
    pub fn new(snapshot: Snapshot, json: bool) -> CacheSink {
        CacheSink {
            buffer: Vec::new(),
            snapshot,
            empty_body: if json {
                NO_FAILURES_JSON
            } else {
                NO_FAILURES_TEXT
            },
        }
    }
}

#[async_trait]
impl Sink for CacheSink {
    async fn write(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        let body = if self.buffer.is_empty() {
            self.empty_body.as_bytes().to_vec()
        } else {
            std::mem::take(&mut self.buffer)
        };
        self.buffer.clear();

        *self.snapshot.write().await = Some(body);
        Ok(())
    }
}

#[derive(Clone)]
struct ServerState {
    snapshot: Snapshot,
    content_type: &'static str,
}

async fn get_data(State(state): State<ServerState>) -> Response {
    let snapshot = state.snapshot.read().await;
    match snapshot.as_ref() {
        // No round has completed yet.
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        Some(body) => (
            [
                (
                    header::ACCESS_CONTROL_ALLOW_ORIGIN,
                    HeaderValue::from_static("*"),
                ),
                (
                    header::CONTENT_TYPE,
                    HeaderValue::from_static(state.content_type),
                ),
            ],
            body.clone(),
        )
            .into_response(),
    }
}

fn create_router(state: ServerState) -> Router {
    Router::new()
        .route("/data", get(get_data))
        .fallback_service(ServeDir::new("public"))
        .with_state(state)
}

/// Runs the server: immediate first round, background refresh on the
/// configured rate, graceful exit on ctrl-c.
pub async fn run(config: Configuration, port: u16) -> anyhow::Result<()> {
    let snapshot: Snapshot = Arc::new(RwLock::new(None));
    let json = config.format == OutputFormat::Json;

    let mut sinks: Vec<Box<dyn Sink>> =
        vec![Box::new(CacheSink::new(Arc::clone(&snapshot), json))];
    sinks.extend(config.webhook_sinks()?);
    let mut executor = config.executor(Box::new(MultiSink::new(sinks)))?;

    let state = ServerState {
        snapshot,
        content_type: if json { "application/json" } else { "text/plain" },
    };

    let targets = config.targets.clone();
    let rate = config.rate;
    tokio::spawn(async move {
        // The first tick fires immediately, so /data comes up fast.
        let mut ticker = tokio::time::interval(rate.max(std::time::Duration::from_secs(1)));
        loop {
            ticker.tick().await;
            if let Err(err) = executor.execute(&targets).await {
                error!(%err, "cache refresh round failed");
            }
        }
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("serving status on http://localhost:{port}/data");

    tokio::select! {
        served = axum::serve(listener, create_router(state)).into_future() => served?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn state_with(snapshot: Option<Vec<u8>>) -> ServerState {
        ServerState {
            snapshot: Arc::new(RwLock::new(snapshot)),
            content_type: "text/plain",
        }
    }

    #[tokio::test]
    async fn data_returns_503_before_first_round() {
        let router = create_router(state_with(None));
        let response = router
            .oneshot(Request::get("/data").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn data_serves_cached_round_with_cors() {
        let router = create_router(state_with(Some(b"[ok]\t200".to_vec())));
        let response = router
            .oneshot(Request::get("/data").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("*"))
        );
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE),
            Some(&HeaderValue::from_static("text/plain"))
        );
    }

    #[tokio::test]
    async fn close_publishes_buffer_and_resets() {
        let snapshot: Snapshot = Arc::new(RwLock::new(None));
        let mut sink = CacheSink::new(Arc::clone(&snapshot), false);

        sink.write(b"round one").await.unwrap();
        sink.close().await.unwrap();
        assert_eq!(snapshot.read().await.as_deref(), Some(b"round one".as_ref()));

        // Next round replaces the snapshot wholesale.
        sink.write(b"round two").await.unwrap();
        sink.close().await.unwrap();
        assert_eq!(snapshot.read().await.as_deref(), Some(b"round two".as_ref()));
    }

    #[tokio::test]
    async fn silent_round_publishes_no_failures_body() {
        let snapshot: Snapshot = Arc::new(RwLock::new(None));
        let mut sink = CacheSink::new(Arc::clone(&snapshot), true);

        sink.close().await.unwrap();
        assert_eq!(
            snapshot.read().await.as_deref(),
            Some(NO_FAILURES_JSON.as_bytes())
        );
    }
}
