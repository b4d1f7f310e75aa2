use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};

/// 对账循环配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// 两次周期之间的等待时间
    pub interval_seconds: u64,
    /// 单个包裹查询的超时时间
    pub fetch_timeout_seconds: u64,
    /// 同一周期内并发处理的包裹数上限
    pub max_concurrent_shipments: usize,
    /// 启动时发送通知
    pub startup_notification: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            fetch_timeout_seconds: 30,
            max_concurrent_shipments: 8,
            startup_notification: true,
        }
    }
}

impl TrackerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }
}

impl ConfigValidator for TrackerConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_seconds(self.interval_seconds, "tracker.interval_seconds")?;
        ValidationUtils::validate_seconds(
            self.fetch_timeout_seconds,
            "tracker.fetch_timeout_seconds",
        )?;
        ValidationUtils::validate_count(
            self.max_concurrent_shipments,
            "tracker.max_concurrent_shipments",
            1000,
        )?;
        Ok(())
    }
}
