use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use trackbert_config::TrackerConfig;
use trackbert_domain::entities::{ObservedEvent, Shipment};
use trackbert_domain::repositories::EventStore;
use trackbert_domain::value_objects::EventTime;
use trackbert_errors::TrackerResult;
use trackbert_infrastructure::observability::{MetricsCollector, StructuredLogger};

use crate::services::{NotificationDispatcher, ProviderRegistry};
use crate::shutdown::ShutdownSignal;
use crate::use_cases::cycle_report::{CycleReport, ShipmentOutcome};

/// 对账引擎参数
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub interval: Duration,
    pub fetch_timeout: Duration,
    pub max_concurrent: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&TrackerConfig::default())
    }
}

impl From<&TrackerConfig> for EngineConfig {
    fn from(config: &TrackerConfig) -> Self {
        Self {
            interval: config.interval(),
            fetch_timeout: config.fetch_timeout(),
            max_concurrent: config.max_concurrent_shipments,
        }
    }
}

/// 对账引擎
///
/// 每个周期读取所有追踪中的包裹，并发查询对应的追踪服务，
/// 与已知的最新事件比较后按时间升序写入新事件并发送通知。
pub struct ReconciliationEngine {
    store: Arc<dyn EventStore>,
    providers: Arc<ProviderRegistry>,
    dispatcher: Arc<NotificationDispatcher>,
    metrics: Arc<MetricsCollector>,
    config: EngineConfig,
}

impl ReconciliationEngine {
    pub fn new(
        store: Arc<dyn EventStore>,
        providers: Arc<ProviderRegistry>,
        dispatcher: Arc<NotificationDispatcher>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            providers,
            dispatcher,
            metrics: Arc::new(MetricsCollector::new()),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 循环执行对账周期，直到收到关闭信号
    ///
    /// 单个周期的失败只记录日志，只有致命错误才会结束循环。
    pub async fn run(&self, shutdown: ShutdownSignal) -> TrackerResult<()> {
        info!(
            "对账引擎启动，周期间隔 {:?}，查询超时 {:?}，并发上限 {}",
            self.config.interval, self.config.fetch_timeout, self.config.max_concurrent
        );

        while !shutdown.is_triggered() {
            match self.run_cycle(&shutdown).await {
                Ok(report) => debug!(
                    "周期 {} 结束: {} 个包裹, {} 条新事件",
                    report.cycle_id,
                    report.shipment_count(),
                    report.new_events()
                ),
                Err(e) if e.is_fatal() => {
                    error!("对账循环遇到致命错误: {}", e);
                    return Err(e);
                }
                Err(e) => error!("对账周期失败: {}", e),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                _ = shutdown.triggered() => {
                    info!("收到关闭信号，停止等待下一个周期");
                }
            }
        }

        info!("对账引擎已停止");
        Ok(())
    }

    /// 执行一个对账周期
    pub async fn run_cycle(&self, shutdown: &ShutdownSignal) -> TrackerResult<CycleReport> {
        let cycle_id = Uuid::new_v4().to_string();
        let started = Instant::now();

        let shipments = self.store.list_tracked_shipments().await?;
        let span = info_span!("reconcile_cycle", cycle_id = %cycle_id, shipments = shipments.len());

        let report = async {
            StructuredLogger::log_cycle_start(&cycle_id, shipments.len());

            let max_concurrent = self.config.max_concurrent.max(1);
            let outcomes: Vec<(String, ShipmentOutcome)> = stream::iter(shipments)
                .map(|shipment| async move {
                    let outcome = self.process_shipment(&shipment, shutdown).await;
                    (shipment.tracking_number, outcome)
                })
                .buffer_unordered(max_concurrent)
                .collect()
                .await;

            let report = CycleReport {
                cycle_id: cycle_id.clone(),
                outcomes,
                duration: started.elapsed(),
            };

            self.metrics
                .record_cycle(report.duration, report.shipment_count());
            StructuredLogger::log_cycle_complete(
                &cycle_id,
                report.processed(),
                report.new_events(),
                report.failures(),
                report.duration.as_millis() as u64,
            );
            report
        }
        .instrument(span)
        .await;

        Ok(report)
    }

    /// 处理单个包裹: 跳过 → 选择服务 → 查询 → 比较 → 逐条写入并通知
    pub async fn process_shipment(
        &self,
        shipment: &Shipment,
        shutdown: &ShutdownSignal,
    ) -> ShipmentOutcome {
        let span = info_span!(
            "reconcile_shipment",
            tracking_number = %shipment.tracking_number,
            carrier = shipment.carrier.as_deref().unwrap_or("")
        );
        self.reconcile(shipment, shutdown).instrument(span).await
    }

    async fn reconcile(&self, shipment: &Shipment, shutdown: &ShutdownSignal) -> ShipmentOutcome {
        if shutdown.is_triggered() {
            return ShipmentOutcome::Cancelled { persisted: 0 };
        }

        let Some(carrier) = shipment.tracked_carrier() else {
            StructuredLogger::log_shipment_skipped(&shipment.tracking_number);
            return ShipmentOutcome::Skipped;
        };

        let Some(provider) = self.providers.resolve(carrier) else {
            StructuredLogger::log_no_provider(&shipment.tracking_number, carrier);
            return ShipmentOutcome::NoProvider;
        };

        // 必须在查询之前读取
        let latest_known = match self.store.latest_event(shipment.id).await {
            Ok(latest) => latest,
            Err(e) => {
                self.metrics.record_store_failure();
                StructuredLogger::log_store_failure(&shipment.tracking_number, &e.to_string());
                return ShipmentOutcome::StoreFailed { persisted: 0 };
            }
        };

        let fetch = tokio::time::timeout(
            self.config.fetch_timeout,
            provider.fetch_events(&shipment.tracking_number, carrier),
        );
        let observed = tokio::select! {
            result = fetch => match result {
                Ok(Ok(events)) => events,
                Ok(Err(e)) => {
                    self.metrics.record_fetch_failure(provider.name());
                    StructuredLogger::log_fetch_failure(
                        &shipment.tracking_number,
                        carrier,
                        provider.name(),
                        &e.to_string(),
                    );
                    return ShipmentOutcome::FetchFailed;
                }
                Err(_) => {
                    self.metrics.record_fetch_timeout();
                    StructuredLogger::log_fetch_timeout(
                        &shipment.tracking_number,
                        provider.name(),
                        self.config.fetch_timeout.as_secs(),
                    );
                    return ShipmentOutcome::TimedOut;
                }
            },
            _ = shutdown.triggered() => {
                debug!("查询 {} 时收到关闭信号", shipment.tracking_number);
                return ShipmentOutcome::Cancelled { persisted: 0 };
            }
        };

        let latest_time = latest_known
            .as_ref()
            .map(|event| EventTime::comparable(&event.event_time));
        let new_events = select_new_events(observed, latest_time.as_deref());

        if new_events.is_empty() {
            debug!("{} 没有新事件", shipment.tracking_number);
            return ShipmentOutcome::UpToDate;
        }

        let last_index = new_events.len() - 1;
        for (index, event) in new_events.iter().enumerate() {
            // 只在两次写入之间响应关闭信号
            if index > 0 && shutdown.is_triggered() {
                info!(
                    "{} 已写入 {} 条事件，收到关闭信号后停止",
                    shipment.tracking_number, index
                );
                return ShipmentOutcome::Cancelled { persisted: index };
            }

            let stored = match self.store.append_event(shipment.id, event).await {
                Ok(stored) => stored,
                Err(e) => {
                    self.metrics.record_store_failure();
                    StructuredLogger::log_store_failure(&shipment.tracking_number, &e.to_string());
                    return ShipmentOutcome::StoreFailed { persisted: index };
                }
            };
            self.metrics.record_event_persisted();

            let urgent = index == last_index;
            StructuredLogger::log_new_event(
                &shipment.tracking_number,
                &stored.event_time,
                &stored.event_description,
                urgent,
            );
            self.dispatcher.notify_event(shipment, &stored, urgent).await;
        }

        ShipmentOutcome::Processed {
            new_events: new_events.len(),
        }
    }
}

/// 规范化时间并升序排序，返回严格晚于 `latest_time` 的事件
///
/// 无法解析时间的事件直接丢弃，不参与比较也不会写入。
pub fn select_new_events(
    observed: Vec<ObservedEvent>,
    latest_time: Option<&str>,
) -> Vec<ObservedEvent> {
    let mut events: Vec<ObservedEvent> = observed
        .into_iter()
        .filter_map(|mut event| match EventTime::normalize(&event.event_time) {
            Ok(normalized) => {
                event.event_time = normalized;
                Some(event)
            }
            Err(_) => {
                warn!(
                    "无法解析事件时间，丢弃事件: {} ({})",
                    event.event_time, event.event_description
                );
                None
            }
        })
        .collect();

    events.sort_by(|a, b| a.event_time.cmp(&b.event_time));

    match latest_time {
        Some(latest) => events
            .into_iter()
            .filter(|event| event.event_time.as_str() > latest)
            .collect(),
        None => events,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trackbert_testing_utils::TestData;

    fn times(events: &[ObservedEvent]) -> Vec<&str> {
        events.iter().map(|e| e.event_time.as_str()).collect()
    }

    #[test]
    fn test_select_new_events_strictly_after_latest() {
        let observed = TestData::observed_many(&[
            ("2024-01-03", "派送中"),
            ("2024-01-01T00:00:00", "已揽收"),
            ("2024-01-02", "运输中"),
        ]);

        let new_events = select_new_events(observed, Some("2024-01-01 00:00:00"));
        assert_eq!(
            times(&new_events),
            vec!["2024-01-02 00:00:00", "2024-01-03 00:00:00"]
        );
    }

    #[test]
    fn test_select_all_when_no_latest() {
        let observed = TestData::observed_many(&[
            ("2024-01-02 10:00:00", "运输中"),
            ("2024-01-01 10:00:00", "已揽收"),
        ]);

        let new_events = select_new_events(observed, None);
        assert_eq!(
            times(&new_events),
            vec!["2024-01-01 10:00:00", "2024-01-02 10:00:00"]
        );
    }

    #[test]
    fn test_offsets_normalized_before_comparison() {
        // 09:30+02:00 即 07:30 UTC，早于已知事件
        let observed = TestData::observed_many(&[("2024-01-01T09:30:00+02:00", "已揽收")]);
        assert!(select_new_events(observed, Some("2024-01-01 08:00:00")).is_empty());
    }

    #[test]
    fn test_unparseable_time_is_dropped() {
        let observed = TestData::observed_many(&[
            ("Mon, 01 Jan 2024", "未知"),
            ("2024-06-01 10:00:00", "已签收"),
        ]);
        let new_events = select_new_events(observed, None);
        assert_eq!(times(&new_events), vec!["2024-06-01 10:00:00"]);
    }

    #[test]
    fn test_engine_config_from_tracker_config() {
        let config = EngineConfig::default();
        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.fetch_timeout, Duration::from_secs(30));
        assert_eq!(config.max_concurrent, 8);
    }
}
