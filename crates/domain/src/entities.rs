use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use trackbert_errors::TrackerResult;

/// 被追踪的包裹
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: i64,
    pub tracking_number: String,
    /// 承运商代码，为空表示不追踪
    pub carrier: Option<String>,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Shipment {
    /// 返回可用于查询的承运商代码，空字符串视为未设置
    pub fn tracked_carrier(&self) -> Option<&str> {
        self.carrier
            .as_deref()
            .map(str::trim)
            .filter(|carrier| !carrier.is_empty())
    }

    /// 通知标题中使用的名称
    pub fn display_name(&self) -> &str {
        self.description
            .as_deref()
            .filter(|description| !description.trim().is_empty())
            .unwrap_or(&self.tracking_number)
    }

    pub fn entity_description(&self) -> String {
        format!("包裹 {} (ID: {})", self.tracking_number, self.id)
    }
}

/// 新建包裹请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewShipment {
    pub tracking_number: String,
    pub carrier: Option<String>,
    pub description: Option<String>,
}

impl NewShipment {
    pub fn new(tracking_number: impl Into<String>, carrier: impl Into<String>) -> Self {
        Self {
            tracking_number: tracking_number.into(),
            carrier: Some(carrier.into()),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// 追踪服务返回的事件，尚未归属任何包裹
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedEvent {
    pub event_time: String,
    pub event_description: String,
    /// 原始数据，核心逻辑不解析
    pub raw_event: serde_json::Value,
}

impl ObservedEvent {
    pub fn new(
        event_time: impl Into<String>,
        event_description: impl Into<String>,
        raw_event: serde_json::Value,
    ) -> Self {
        Self {
            event_time: event_time.into(),
            event_description: event_description.into(),
            raw_event,
        }
    }
}

/// 已持久化的包裹事件，创建后不可修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub shipment_id: i64,
    pub event_time: String,
    pub event_description: String,
    pub raw_event: serde_json::Value,
}

impl Event {
    /// 序列化原始数据用于存储
    pub fn encode_raw(raw_event: &serde_json::Value) -> TrackerResult<String> {
        Ok(serde_json::to_string(raw_event)?)
    }

    /// 从存储中还原原始数据
    pub fn decode_raw(raw: &str) -> TrackerResult<serde_json::Value> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn entity_description(&self) -> String {
        format!(
            "事件 {} (包裹ID: {}, 时间: {})",
            self.id, self.shipment_id, self.event_time
        )
    }
}
