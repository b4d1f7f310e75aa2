use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info};

use trackbert_domain::entities::{Event, Shipment};
use trackbert_infrastructure::observability::{MetricsCollector, StructuredLogger};

use super::notifier_registry::NotifierRegistry;

/// 一次广播的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub delivered: usize,
    pub failed: usize,
}

/// 把通知广播给所有启用的渠道，单个渠道失败不影响其他渠道
pub struct NotificationDispatcher {
    registry: Arc<NotifierRegistry>,
    metrics: Arc<MetricsCollector>,
}

impl NotificationDispatcher {
    pub fn new(registry: Arc<NotifierRegistry>) -> Self {
        Self {
            registry,
            metrics: Arc::new(MetricsCollector::new()),
        }
    }

    pub async fn dispatch(&self, title: &str, message: &str, urgent: bool) -> DispatchSummary {
        let notifiers = self.registry.active();
        debug!(
            "向 {} 个通知渠道发送: {} (紧急: {})",
            notifiers.len(),
            title,
            urgent
        );

        let results = join_all(
            notifiers
                .iter()
                .map(|notifier| notifier.notify(title, message, urgent)),
        )
        .await;

        let mut summary = DispatchSummary::default();
        for (notifier, result) in notifiers.iter().zip(results) {
            match result {
                Ok(()) => summary.delivered += 1,
                Err(e) => {
                    summary.failed += 1;
                    self.metrics.record_notifier_failure(notifier.name());
                    StructuredLogger::log_notifier_failure(notifier.name(), &e.to_string());
                }
            }
        }
        summary
    }

    /// 发送新事件通知
    pub async fn notify_event(
        &self,
        shipment: &Shipment,
        event: &Event,
        urgent: bool,
    ) -> DispatchSummary {
        info!(
            "New event for {}: {} - {}",
            shipment.tracking_number, event.event_description, event.event_time
        );
        let (title, message) = Self::event_message(shipment, event);
        self.dispatch(&title, &message, urgent).await
    }

    pub fn event_message(shipment: &Shipment, event: &Event) -> (String, String) {
        (
            format!("New event for {}", shipment.display_name()),
            format!("{} - {}", event.event_description, event.event_time),
        )
    }
}
