//! HTTP server for Prometheus metrics export.
//!
//! Runs on its own OS thread (not the reactor's tokio runtime) so a stalled
//! reactor tick never blocks scraping.

use super::MetricsRegistry;
use anyhow::{Context, Result};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    pub listen_addr: SocketAddr,
    pub metrics_path: String,
    /// Surfaced on the root page so an operator staring at `curl localhost:9090/`
    /// can tell a dry-run process apart from one that is live-trading.
    pub dry_run: bool,
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:9090".parse().unwrap(),
            metrics_path: "/metrics".to_string(),
            dry_run: false,
        }
    }
}

pub struct MetricsServer {
    config: MetricsServerConfig,
    registry: Arc<MetricsRegistry>,
}

impl MetricsServer {
    pub fn new(config: MetricsServerConfig, registry: Arc<MetricsRegistry>) -> Self {
        Self { config, registry }
    }

    /// Runs indefinitely, serving metrics on the configured address. Meant
    /// to be driven by a single-threaded tokio runtime built on its own OS
    /// thread — see [`crate::monitoring::spawn_metrics_thread`].
    pub async fn serve(self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.listen_addr)
            .await
            .context("failed to bind metrics server")?;

        info!(
            "metrics server listening on http://{}{}",
            self.config.listen_addr, self.config.metrics_path
        );

        let registry = self.registry.clone();
        let metrics_path = self.config.metrics_path.clone();
        let dry_run = self.config.dry_run;

        loop {
            let (stream, remote_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!("failed to accept metrics connection: {}", e);
                    continue;
                }
            };

            let registry = registry.clone();
            let metrics_path = metrics_path.clone();

            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                    let registry = registry.clone();
                    let metrics_path = metrics_path.clone();
                    async move { handle_request(req, registry, metrics_path, dry_run).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("metrics connection error from {}: {}", remote_addr, err);
                }
            });
        }
    }

    pub fn serve_metrics_once(&self) -> Result<String> {
        encode_metrics(&self.registry)
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    registry: Arc<MetricsRegistry>,
    metrics_path: String,
    dry_run: bool,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let path = req.uri().path();
    debug!("metrics request: {} {}", req.method(), path);

    if path == "/" {
        let body = format!(
            "mirror reactor metrics server\ndry_run: {}\nendpoints: {} /health\n",
            dry_run, metrics_path
        );
        return Ok(Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "text/plain")
            .body(Full::new(Bytes::from(body)))
            .unwrap());
    }

    if path == "/health" || path == "/healthz" {
        return match disconnected_accounts(&registry) {
            disconnected if disconnected.is_empty() => Ok(Response::builder()
                .status(StatusCode::OK)
                .body(Full::new(Bytes::from("OK")))
                .unwrap()),
            disconnected => {
                warn!("health check: accounts disconnected: {}", disconnected.join(", "));
                Ok(Response::builder()
                    .status(StatusCode::SERVICE_UNAVAILABLE)
                    .body(Full::new(Bytes::from(format!("disconnected: {}", disconnected.join(", ")))))
                    .unwrap())
            }
        };
    }

    if path == metrics_path {
        return match encode_metrics(&registry) {
            Ok(text) => Ok(Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "text/plain; version=0.0.4")
                .body(Full::new(Bytes::from(text)))
                .unwrap()),
            Err(e) => {
                error!("failed to encode metrics: {}", e);
                Ok(Response::builder()
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .body(Full::new(Bytes::from(format!("error: {}", e))))
                    .unwrap())
            }
        };
    }

    warn!("unknown metrics endpoint requested: {}", path);
    Ok(Response::builder()
        .status(StatusCode::NOT_FOUND)
        .body(Full::new(Bytes::from("not found")))
        .unwrap())
}

/// Account names whose `ws_connected` gauge currently reads `0`. Used to
/// turn `/health` into a real readiness probe instead of a constant `OK`.
fn disconnected_accounts(registry: &MetricsRegistry) -> Vec<String> {
    registry
        .registry()
        .gather()
        .into_iter()
        .find(|family| family.get_name() == "mirror_ws_connected")
        .map(|family| {
            family
                .get_metric()
                .iter()
                .filter(|m| m.get_gauge().get_value() == 0.0)
                .filter_map(|m| m.get_label().iter().find(|l| l.get_name() == "account").map(|l| l.get_value().to_string()))
                .collect()
        })
        .unwrap_or_default()
}

fn encode_metrics(registry: &MetricsRegistry) -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = registry.registry().gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).context("failed to encode metrics")?;
    String::from_utf8(buffer).context("invalid utf-8 in metrics")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_binds_loopback_9090() {
        let config = MetricsServerConfig::default();
        assert_eq!(config.metrics_path, "/metrics");
        assert_eq!(config.listen_addr.port(), 9090);
    }

    #[test]
    fn serve_metrics_once_renders_registered_families() {
        let registry = Arc::new(MetricsRegistry::new().unwrap());
        registry.order_count.with_label_values(&["buy", "BTC-USD"]).set(2);
        let server = MetricsServer::new(MetricsServerConfig::default(), registry);

        let rendered = server.serve_metrics_once().unwrap();
        assert!(rendered.contains("mirror_order_count"));
        assert!(rendered.contains("TYPE"));
    }

    #[test]
    fn disconnected_accounts_is_empty_when_every_account_reports_connected() {
        let registry = MetricsRegistry::new().unwrap();
        registry.ws_connected.with_label_values(&["main"]).set(1);
        assert!(disconnected_accounts(&registry).is_empty());
    }

    #[test]
    fn disconnected_accounts_names_the_accounts_reporting_zero() {
        let registry = MetricsRegistry::new().unwrap();
        registry.ws_connected.with_label_values(&["main"]).set(1);
        registry.ws_connected.with_label_values(&["secondary"]).set(0);
        assert_eq!(disconnected_accounts(&registry), vec!["secondary".to_string()]);
    }
}
