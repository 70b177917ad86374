//! Monitoring and observability: Prometheus metrics and the HTTP server
//! that exposes them for scraping.

pub mod metrics;
pub mod server;

pub use metrics::MetricsRegistry;
pub use server::{MetricsServer, MetricsServerConfig};

use std::sync::Arc;
use std::thread;

/// Spawns the metrics HTTP server on its own OS thread, with its own
/// single-threaded tokio runtime, so it keeps answering scrapes even if the
/// reactor's runtime is stalled mid-tick.
pub fn spawn_metrics_thread(config: MetricsServerConfig, registry: Arc<MetricsRegistry>) {
    thread::Builder::new()
        .name("metrics-server".into())
        .spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to build metrics server runtime");
            let server = MetricsServer::new(config, registry);
            if let Err(e) = runtime.block_on(server.serve()) {
                tracing::error!("metrics server exited: {}", e);
            }
        })
        .expect("failed to spawn metrics server thread");
}
