use serde_json::json;
use trackbert_domain::entities::ObservedEvent;

/// 多个mock共享的调用记录，用于断言跨协作者的调用顺序
pub type CallLog = std::sync::Arc<std::sync::Mutex<Vec<String>>>;

pub fn new_call_log() -> CallLog {
    CallLog::default()
}

pub struct TestData;

impl TestData {
    /// 原始数据与KeyDelivery返回的条目结构一致
    pub fn observed(event_time: &str, description: &str) -> ObservedEvent {
        ObservedEvent::new(
            event_time,
            description,
            json!({"time": event_time, "context": description}),
        )
    }

    pub fn observed_many(events: &[(&str, &str)]) -> Vec<ObservedEvent> {
        events
            .iter()
            .map(|(time, description)| Self::observed(time, description))
            .collect()
    }
}

pub struct IntegrationTestSetup;

impl IntegrationTestSetup {
    /// 每个测试二进制调用一次即可，重复调用会被忽略
    pub fn init_logging() {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter("debug")
            .try_init();
    }
}
