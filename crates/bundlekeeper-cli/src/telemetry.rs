//! tracing-subscriber と Prometheus エクスポータの初期化

use std::net::SocketAddr;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` があればそれを使い、無ければ bundlekeeper のログだけ info で出す
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bundlekeeper=info,bundlekeeper_core=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// `/metrics` を `addr` で公開する。tokio ランタイム内で呼ぶこと
pub fn install_metrics(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("installing Prometheus exporter on {addr}"))?;
    bundlekeeper_core::app::metrics::describe();
    tracing::info!(%addr, "Serving Prometheus metrics");
    Ok(())
}
