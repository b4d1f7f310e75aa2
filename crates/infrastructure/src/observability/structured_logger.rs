use tracing::{debug, error, info, warn};

/// 带 `event` 字段的结构化日志，便于在JSON日志中检索
pub struct StructuredLogger;

impl StructuredLogger {
    pub fn log_cycle_start(cycle_id: &str, shipment_count: usize) {
        info!(
            event = "cycle_start",
            cycle.id = cycle_id,
            cycle.shipments = shipment_count,
            "开始对账周期"
        );
    }

    pub fn log_cycle_complete(
        cycle_id: &str,
        processed: usize,
        new_events: usize,
        failures: usize,
        duration_ms: u64,
    ) {
        info!(
            event = "cycle_complete",
            cycle.id = cycle_id,
            cycle.processed = processed,
            cycle.new_events = new_events,
            cycle.failures = failures,
            cycle.duration_ms = duration_ms,
            "对账周期完成"
        );
    }

    pub fn log_shipment_skipped(tracking_number: &str) {
        debug!(
            event = "shipment_skipped",
            shipment.tracking_number = tracking_number,
            "包裹未设置承运商，跳过"
        );
    }

    pub fn log_no_provider(tracking_number: &str, carrier: &str) {
        warn!(
            event = "no_provider",
            shipment.tracking_number = tracking_number,
            shipment.carrier = carrier,
            "没有可用的追踪服务"
        );
    }

    pub fn log_fetch_failure(tracking_number: &str, carrier: &str, provider: &str, error: &str) {
        warn!(
            event = "fetch_failure",
            shipment.tracking_number = tracking_number,
            shipment.carrier = carrier,
            provider.name = provider,
            error = error,
            "查询追踪服务失败"
        );
    }

    pub fn log_fetch_timeout(tracking_number: &str, provider: &str, timeout_secs: u64) {
        warn!(
            event = "fetch_timeout",
            shipment.tracking_number = tracking_number,
            provider.name = provider,
            timeout_secs = timeout_secs,
            "查询追踪服务超时"
        );
    }

    pub fn log_new_event(tracking_number: &str, event_time: &str, description: &str, urgent: bool) {
        info!(
            event = "new_event",
            shipment.tracking_number = tracking_number,
            event.time = event_time,
            event.description = description,
            urgent = urgent,
            "发现新事件"
        );
    }

    pub fn log_store_failure(tracking_number: &str, error: &str) {
        error!(
            event = "store_failure",
            shipment.tracking_number = tracking_number,
            error = error,
            "保存事件失败，放弃该包裹剩余事件"
        );
    }

    pub fn log_notifier_failure(notifier: &str, error: &str) {
        warn!(
            event = "notifier_failure",
            notifier.name = notifier,
            error = error,
            "发送通知失败"
        );
    }
}
