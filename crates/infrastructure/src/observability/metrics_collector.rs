use std::time::Duration;

use metrics::{counter, gauge, histogram, Counter, Gauge, Histogram};

/// 对账循环的Prometheus指标
///
/// 未安装导出器时所有记录操作都是空操作。
pub struct MetricsCollector {
    cycles_total: Counter,
    cycle_duration: Histogram,
    tracked_shipments: Gauge,
    events_persisted_total: Counter,
    fetch_timeouts_total: Counter,
    store_failures_total: Counter,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            cycles_total: counter!("trackbert_cycles_total"),
            cycle_duration: histogram!("trackbert_cycle_duration_seconds"),
            tracked_shipments: gauge!("trackbert_tracked_shipments"),
            events_persisted_total: counter!("trackbert_events_persisted_total"),
            fetch_timeouts_total: counter!("trackbert_fetch_timeouts_total"),
            store_failures_total: counter!("trackbert_store_failures_total"),
        }
    }

    pub fn record_cycle(&self, duration: Duration, shipment_count: usize) {
        self.cycles_total.increment(1);
        self.cycle_duration.record(duration.as_secs_f64());
        self.tracked_shipments.set(shipment_count as f64);
    }

    pub fn record_event_persisted(&self) {
        self.events_persisted_total.increment(1);
    }

    pub fn record_fetch_failure(&self, provider: &str) {
        counter!("trackbert_fetch_failures_total", "provider" => provider.to_string()).increment(1);
    }

    pub fn record_fetch_timeout(&self) {
        self.fetch_timeouts_total.increment(1);
    }

    pub fn record_store_failure(&self) {
        self.store_failures_total.increment(1);
    }

    pub fn record_notifier_failure(&self, notifier: &str) {
        counter!("trackbert_notifier_failures_total", "notifier" => notifier.to_string())
            .increment(1);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
