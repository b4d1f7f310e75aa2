use std::net::SocketAddr;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

/// 安装全局Prometheus记录器，并在 `bind_address` 上暴露 `/metrics`
///
/// 需要在tokio运行时中调用。
pub fn init_metrics(bind_address: &str) -> Result<()> {
    let addr: SocketAddr = bind_address
        .parse()
        .with_context(|| format!("无效的指标监听地址: {bind_address}"))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("安装Prometheus导出器失败: {}", e))?;

    info!("Prometheus指标已在 {} 暴露", addr);
    Ok(())
}
