//! HTTP server for danmu consumers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::Request;
use axum::response::Response;
use danmaku::{IntakeStatistics, RetentionBuffer};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{Span, debug, info, info_span};

use crate::api::routes;
use crate::error::{Error, Result};
use crate::logging::LoggingConfig;

/// Where and how the API is served.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub port: u16,
    /// Allow any origin, so browser dashboards can poll the API
    pub enable_cors: bool,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1".to_string(),
            port: 8766,
            enable_cors: true,
        }
    }
}

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub started: Instant,
    pub buffer: Arc<RetentionBuffer>,
    pub stats: Arc<IntakeStatistics>,
    /// Present only when the global subscriber was installed by this process
    pub logging: Option<Arc<LoggingConfig>>,
}

impl AppState {
    pub fn new(buffer: Arc<RetentionBuffer>, stats: Arc<IntakeStatistics>) -> Self {
        Self {
            started: Instant::now(),
            buffer,
            stats,
            logging: None,
        }
    }

    pub fn with_logging(mut self, logging: Arc<LoggingConfig>) -> Self {
        self.logging = Some(logging);
        self
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Read-only API over the retention buffer.
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
    cancel_token: CancellationToken,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, state: AppState) -> Self {
        Self {
            config,
            state,
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Routes with CORS and request tracing applied.
    pub fn router(&self) -> Router {
        let router = routes::create_router(self.state.clone());
        let router = if self.config.enable_cors {
            router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
        } else {
            router
        };

        router.layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_response(log_response),
        )
    }

    /// Bind the configured address. Call before spawning [`ApiServer::serve`]
    /// so an occupied port fails startup.
    pub async fn bind(&self) -> Result<TcpListener> {
        Ok(TcpListener::bind((self.config.bind_address.as_str(), self.config.port)).await?)
    }

    /// Serve on an already bound listener until shut down.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        info!("Danmu API listening on http://{}", listener.local_addr()?);

        let cancel_token = self.cancel_token.clone();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { cancel_token.cancelled().await })
            .await
            .map_err(|e| Error::Api(e.to_string()))?;

        info!("Danmu API stopped");
        Ok(())
    }

    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

/// Health probes are polled constantly and are not traced.
fn request_span(req: &Request) -> Span {
    let path = req.uri().path();
    if path.starts_with("/health") {
        return Span::none();
    }
    info_span!("request", method = %req.method(), path = %path)
}

fn log_response(res: &Response, latency: Duration, span: &Span) {
    if span.is_disabled() {
        return;
    }
    debug!(status = %res.status(), latency_ms = latency.as_millis() as u64, "Request finished");
}
