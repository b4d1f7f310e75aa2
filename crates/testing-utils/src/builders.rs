//! 测试数据构建器

use chrono::Utc;
use trackbert_domain::entities::{Event, Shipment};

pub struct ShipmentBuilder {
    shipment: Shipment,
}

impl ShipmentBuilder {
    pub fn new() -> Self {
        Self {
            shipment: Shipment {
                id: 1,
                tracking_number: "TRACK-0001".to_string(),
                carrier: Some("dhl".to_string()),
                description: None,
                active: true,
                created_at: Utc::now(),
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.shipment.id = id;
        self
    }

    pub fn with_tracking_number(mut self, tracking_number: &str) -> Self {
        self.shipment.tracking_number = tracking_number.to_string();
        self
    }

    pub fn with_carrier(mut self, carrier: &str) -> Self {
        self.shipment.carrier = Some(carrier.to_string());
        self
    }

    pub fn without_carrier(mut self) -> Self {
        self.shipment.carrier = None;
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.shipment.description = Some(description.to_string());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.shipment.active = false;
        self
    }

    pub fn build(self) -> Shipment {
        self.shipment
    }
}

impl Default for ShipmentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct EventBuilder {
    event: Event,
}

impl EventBuilder {
    pub fn new() -> Self {
        Self {
            event: Event {
                id: 1,
                shipment_id: 1,
                event_time: "2024-01-01 00:00:00".to_string(),
                event_description: "已揽收".to_string(),
                raw_event: serde_json::json!({}),
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.event.id = id;
        self
    }

    pub fn with_shipment_id(mut self, shipment_id: i64) -> Self {
        self.event.shipment_id = shipment_id;
        self
    }

    pub fn with_time(mut self, event_time: &str) -> Self {
        self.event.event_time = event_time.to_string();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.event.event_description = description.to_string();
        self
    }

    pub fn build(self) -> Event {
        self.event
    }
}

impl Default for EventBuilder {
    fn default() -> Self {
        Self::new()
    }
}
