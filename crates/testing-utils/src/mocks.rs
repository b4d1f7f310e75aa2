//! 内存实现的测试替身
//!
//! 所有mock都可以 `clone`，克隆体共享内部状态，便于测试在交给被测对象后继续断言。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use trackbert_domain::entities::{Event, NewShipment, ObservedEvent, Shipment};
use trackbert_domain::ports::{Notifier, TrackingProvider};
use trackbert_domain::repositories::{EventStore, ShipmentRepository};
use trackbert_domain::value_objects::CarrierSupport;
use trackbert_errors::{TrackerError, TrackerResult};

use crate::helpers::CallLog;

#[derive(Debug, Default)]
struct StoreState {
    shipments: Vec<Shipment>,
    events: Vec<Event>,
    next_event_id: i64,
    appends: usize,
}

/// 内存事件存储
#[derive(Debug, Clone, Default)]
pub struct MockEventStore {
    state: Arc<Mutex<StoreState>>,
    fail_appends_after: Option<usize>,
    fail_listing: bool,
    call_log: Option<CallLog>,
}

impl MockEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shipments(shipments: Vec<Shipment>) -> Self {
        let store = Self::new();
        store.state.lock().unwrap().shipments = shipments;
        store
    }

    pub fn with_events(self, events: Vec<Event>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.next_event_id = events.iter().map(|e| e.id).max().unwrap_or(0);
            state.events = events;
        }
        self
    }

    /// 前 `successful` 次写入成功，之后的写入全部失败
    pub fn fail_appends_after(mut self, successful: usize) -> Self {
        self.fail_appends_after = Some(successful);
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn with_call_log(mut self, call_log: CallLog) -> Self {
        self.call_log = Some(call_log);
        self
    }

    pub fn events_for(&self, shipment_id: i64) -> Vec<Event> {
        let state = self.state.lock().unwrap();
        state
            .events
            .iter()
            .filter(|e| e.shipment_id == shipment_id)
            .cloned()
            .collect()
    }

    pub fn all_events(&self) -> Vec<Event> {
        self.state.lock().unwrap().events.clone()
    }

    /// 包含失败的写入尝试
    pub fn append_attempts(&self) -> usize {
        self.state.lock().unwrap().appends
    }

    pub fn shipments(&self) -> Vec<Shipment> {
        self.state.lock().unwrap().shipments.clone()
    }

    fn record(&self, entry: String) {
        if let Some(log) = &self.call_log {
            log.lock().unwrap().push(entry);
        }
    }
}

#[async_trait]
impl EventStore for MockEventStore {
    async fn list_tracked_shipments(&self) -> TrackerResult<Vec<Shipment>> {
        if self.fail_listing {
            return Err(TrackerError::database_error("mock listing failure"));
        }
        let state = self.state.lock().unwrap();
        Ok(state.shipments.iter().filter(|s| s.active).cloned().collect())
    }

    async fn latest_event(&self, shipment_id: i64) -> TrackerResult<Option<Event>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .events
            .iter()
            .filter(|e| e.shipment_id == shipment_id)
            .max_by(|a, b| (&a.event_time, a.id).cmp(&(&b.event_time, b.id)))
            .cloned())
    }

    async fn append_event(&self, shipment_id: i64, event: &ObservedEvent) -> TrackerResult<Event> {
        let stored = {
            let mut state = self.state.lock().unwrap();
            state.appends += 1;
            if let Some(limit) = self.fail_appends_after {
                if state.appends > limit {
                    drop(state);
                    self.record(format!("append_failed:{}", event.event_time));
                    return Err(TrackerError::database_error("mock append failure"));
                }
            }
            state.next_event_id += 1;
            let stored = Event {
                id: state.next_event_id,
                shipment_id,
                event_time: event.event_time.clone(),
                event_description: event.event_description.clone(),
                raw_event: event.raw_event.clone(),
            };
            state.events.push(stored.clone());
            stored
        };
        self.record(format!("append:{}", stored.event_time));
        Ok(stored)
    }
}

#[async_trait]
impl ShipmentRepository for MockEventStore {
    async fn create_shipment(&self, shipment: &NewShipment) -> TrackerResult<Shipment> {
        let mut state = self.state.lock().unwrap();
        if state
            .shipments
            .iter()
            .any(|s| s.tracking_number == shipment.tracking_number)
        {
            return Err(TrackerError::shipment_exists(&shipment.tracking_number));
        }
        let created = Shipment {
            id: state.shipments.iter().map(|s| s.id).max().unwrap_or(0) + 1,
            tracking_number: shipment.tracking_number.clone(),
            carrier: shipment.carrier.clone(),
            description: shipment.description.clone(),
            active: true,
            created_at: Utc::now(),
        };
        state.shipments.push(created.clone());
        Ok(created)
    }

    async fn get_shipment(&self, tracking_number: &str) -> TrackerResult<Option<Shipment>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .shipments
            .iter()
            .find(|s| s.tracking_number == tracking_number)
            .cloned())
    }

    async fn update_shipment(
        &self,
        tracking_number: &str,
        carrier: Option<&str>,
        description: Option<&str>,
    ) -> TrackerResult<Shipment> {
        let mut state = self.state.lock().unwrap();
        let shipment = state
            .shipments
            .iter_mut()
            .find(|s| s.tracking_number == tracking_number)
            .ok_or_else(|| TrackerError::shipment_not_found(tracking_number))?;
        if let Some(carrier) = carrier {
            shipment.carrier = Some(carrier.to_string());
        }
        if let Some(description) = description {
            shipment.description = Some(description.to_string());
        }
        Ok(shipment.clone())
    }

    async fn disable_shipment(&self, tracking_number: &str) -> TrackerResult<()> {
        let mut state = self.state.lock().unwrap();
        let shipment = state
            .shipments
            .iter_mut()
            .find(|s| s.tracking_number == tracking_number)
            .ok_or_else(|| TrackerError::shipment_not_found(tracking_number))?;
        shipment.active = false;
        Ok(())
    }

    async fn shipment_events(&self, shipment_id: i64) -> TrackerResult<Vec<Event>> {
        let mut events = self.events_for(shipment_id);
        events.sort_by(|a, b| (&a.event_time, a.id).cmp(&(&b.event_time, b.id)));
        Ok(events)
    }
}

/// 可配置的追踪服务
#[derive(Debug, Clone)]
pub struct MockProvider {
    name: String,
    carriers: Vec<CarrierSupport>,
    carriers_error: bool,
    responses: Arc<Mutex<HashMap<String, Vec<ObservedEvent>>>>,
    failing_tracking_numbers: Arc<Mutex<Vec<String>>>,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            carriers: Vec::new(),
            carriers_error: false,
            responses: Arc::new(Mutex::new(HashMap::new())),
            failing_tracking_numbers: Arc::new(Mutex::new(Vec::new())),
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn supporting(mut self, carrier: &str, priority: i32) -> Self {
        self.carriers.push(CarrierSupport::new(carrier, priority));
        self
    }

    /// `supported_carriers` 返回错误
    pub fn failing_carriers(mut self) -> Self {
        self.carriers_error = true;
        self
    }

    pub fn with_events(self, tracking_number: &str, events: Vec<ObservedEvent>) -> Self {
        self.set_events(tracking_number, events);
        self
    }

    pub fn failing_for(self, tracking_number: &str) -> Self {
        self.failing_tracking_numbers
            .lock()
            .unwrap()
            .push(tracking_number.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 替换某个单号的返回结果，用于模拟多个周期
    pub fn set_events(&self, tracking_number: &str, events: Vec<ObservedEvent>) {
        self.responses
            .lock()
            .unwrap()
            .insert(tracking_number.to_string(), events);
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrackingProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn supported_carriers(&self) -> TrackerResult<Vec<CarrierSupport>> {
        if self.carriers_error {
            return Err(TrackerError::provider_error(&self.name, "mock carrier listing failure"));
        }
        Ok(self.carriers.clone())
    }

    async fn fetch_events(
        &self,
        tracking_number: &str,
        carrier: &str,
    ) -> TrackerResult<Vec<ObservedEvent>> {
        self.calls
            .lock()
            .unwrap()
            .push((tracking_number.to_string(), carrier.to_string()));

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let failing = self
            .failing_tracking_numbers
            .lock()
            .unwrap()
            .iter()
            .any(|t| t == tracking_number);
        if failing {
            return Err(TrackerError::provider_error(&self.name, "mock fetch failure"));
        }

        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(tracking_number)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentNotification {
    pub title: String,
    pub message: String,
    pub urgent: bool,
}

/// 记录通知的通知渠道
#[derive(Debug, Clone)]
pub struct MockNotifier {
    name: String,
    enabled: bool,
    failing: bool,
    sent: Arc<Mutex<Vec<SentNotification>>>,
    enabled_checks: Arc<AtomicUsize>,
    call_log: Option<CallLog>,
}

impl MockNotifier {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
            failing: false,
            sent: Arc::new(Mutex::new(Vec::new())),
            enabled_checks: Arc::new(AtomicUsize::new(0)),
            call_log: None,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// 每次通知都返回错误，但仍然记录
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn with_call_log(mut self, call_log: CallLog) -> Self {
        self.call_log = Some(call_log);
        self
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn enabled_checks(&self) -> usize {
        self.enabled_checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn enabled(&self) -> bool {
        self.enabled_checks.fetch_add(1, Ordering::SeqCst);
        self.enabled
    }

    async fn notify(&self, title: &str, message: &str, urgent: bool) -> TrackerResult<()> {
        self.sent.lock().unwrap().push(SentNotification {
            title: title.to_string(),
            message: message.to_string(),
            urgent,
        });
        if let Some(log) = &self.call_log {
            log.lock().unwrap().push(format!("notify:{}:{}", self.name, urgent));
        }
        if self.failing {
            return Err(TrackerError::notifier_error(&self.name, "mock notify failure"));
        }
        Ok(())
    }
}
