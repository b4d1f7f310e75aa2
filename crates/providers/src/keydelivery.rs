use std::time::Duration;

use async_trait::async_trait;
use md5::{Digest, Md5};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use trackbert_config::KeyDeliveryConfig;
use trackbert_domain::entities::ObservedEvent;
use trackbert_domain::ports::TrackingProvider;
use trackbert_domain::value_objects::{CarrierPattern, CarrierSupport};
use trackbert_errors::{TrackerError, TrackerResult};

const PROVIDER_NAME: &str = "keydelivery";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct CarrierListResponse {
    #[serde(default)]
    data: Vec<CarrierEntry>,
}

#[derive(Debug, Deserialize)]
struct CarrierEntry {
    code: String,
    name: Option<String>,
}

/// KeyDelivery (kd100) 实时查询接口
pub struct KeyDeliveryProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    priority: i32,
}

impl KeyDeliveryProvider {
    pub fn new(config: &KeyDeliveryConfig) -> TrackerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("trackbert/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let base_url = config.base_url.trim_end_matches('/');
        reqwest::Url::parse(base_url).map_err(|e| {
            TrackerError::provider_error(PROVIDER_NAME, format!("无效的接口地址 {base_url}: {e}"))
        })?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            priority: config.priority,
        })
    }

    /// 签名为 `body + api_key + api_secret` 的MD5，大写十六进制
    pub fn sign(&self, body: &str) -> String {
        signature_of(body, &self.api_key, &self.api_secret)
    }

    async fn post(&self, path: &str, payload: &Value) -> TrackerResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        let body = serde_json::to_string(payload)?;

        debug!("KeyDelivery请求: POST {}", url);
        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("API-Key", &self.api_key)
            .header("signature", self.sign(&body))
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TrackerError::provider_error(
                PROVIDER_NAME,
                format!("HTTP {} from {}: {}", status.as_u16(), path, text),
            ));
        }

        Ok(response.json::<Value>().await?)
    }

    /// 把 `data.items` 中的条目转换为事件，完整条目作为原始数据保存
    fn parse_items(response: &Value, tracking_number: &str) -> TrackerResult<Vec<ObservedEvent>> {
        let items = response
            .pointer("/data/items")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                TrackerError::provider_error(
                    PROVIDER_NAME,
                    format!("响应中缺少 data.items ({tracking_number}): {response}"),
                )
            })?;

        debug!("{} 返回 {} 条事件", tracking_number, items.len());

        items
            .iter()
            .map(|item| {
                let time = item.get("time").and_then(Value::as_str).ok_or_else(|| {
                    TrackerError::provider_error(PROVIDER_NAME, format!("事件缺少 time 字段: {item}"))
                })?;
                let context = item
                    .get("context")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                Ok(ObservedEvent::new(time, context, item.clone()))
            })
            .collect()
    }
}

pub fn signature_of(body: &str, api_key: &str, api_secret: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(body.as_bytes());
    hasher.update(api_key.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode_upper(hasher.finalize())
}

#[async_trait]
impl TrackingProvider for KeyDeliveryProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    /// 获取承运商列表失败时注册通配符，由KeyDelivery兜底所有承运商
    async fn supported_carriers(&self) -> TrackerResult<Vec<CarrierSupport>> {
        let carriers = match self.post("/carriers/list", &json!({})).await {
            Ok(response) => serde_json::from_value::<CarrierListResponse>(response)
                .map(|list| list.data)
                .map_err(TrackerError::from),
            Err(e) => Err(e),
        };

        match carriers {
            Ok(entries) if !entries.is_empty() => Ok(entries
                .into_iter()
                .map(|entry| {
                    let support = CarrierSupport::new(&entry.code, self.priority);
                    match entry.name {
                        Some(name) => support.with_display_name(name),
                        None => support,
                    }
                })
                .collect()),
            Ok(_) => {
                warn!("KeyDelivery承运商列表为空，注册为通配符");
                Ok(vec![CarrierSupport::new(CarrierPattern::WILDCARD, self.priority)])
            }
            Err(e) => {
                warn!("获取KeyDelivery承运商列表失败，注册为通配符: {}", e);
                Ok(vec![CarrierSupport::new(CarrierPattern::WILDCARD, self.priority)])
            }
        }
    }

    async fn fetch_events(
        &self,
        tracking_number: &str,
        carrier: &str,
    ) -> TrackerResult<Vec<ObservedEvent>> {
        let payload = json!({
            "carrier_id": carrier,
            "tracking_number": tracking_number,
        });
        let response = self.post("/tracking/realtime", &payload).await?;
        Self::parse_items(&response, tracking_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_uppercase_md5() {
        // MD5("abc")
        assert_eq!(signature_of("a", "b", "c"), "900150983CD24FB0D6963F7D28E17F72");
    }

    #[test]
    fn test_parse_items_keeps_raw_item() {
        let response = json!({
            "code": 200,
            "data": {"items": [
                {"time": "2024-01-02 10:00:00", "context": "派送中", "status": 5},
                {"time": "2024-01-01 09:00:00", "context": "已揽收", "status": 1}
            ]}
        });

        let events = KeyDeliveryProvider::parse_items(&response, "1Z").unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_time, "2024-01-02 10:00:00");
        assert_eq!(events[0].event_description, "派送中");
        assert_eq!(events[0].raw_event["status"], 5);
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let config = KeyDeliveryConfig {
            base_url: "kd100 api".to_string(),
            ..Default::default()
        };
        assert!(KeyDeliveryProvider::new(&config).is_err());
    }

    #[test]
    fn test_missing_items_is_error() {
        let response = json!({"code": 400, "message": "invalid tracking number"});
        let err = KeyDeliveryProvider::parse_items(&response, "1Z").unwrap_err();
        assert!(matches!(err, TrackerError::Provider { .. }));
    }

    #[test]
    fn test_empty_items_is_valid() {
        let response = json!({"data": {"items": []}});
        assert!(KeyDeliveryProvider::parse_items(&response, "1Z")
            .unwrap()
            .is_empty());
    }
}
