use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use trackbert_errors::{TrackerError, TrackerResult};

/// 事件时间的统一存储格式，定长且可按字典序比较
pub const CANONICAL_EVENT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const OFFSET_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// 事件时间规范化
///
/// 不同追踪服务返回的时间格式不一致，比较前必须统一为
/// `YYYY-MM-DD HH:MM:SS` (UTC)。没有时区信息的时间按UTC处理。
pub struct EventTime;

impl EventTime {
    pub fn normalize(raw: &str) -> TrackerResult<String> {
        let raw = raw.trim();

        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Ok(Self::format(parsed.with_timezone(&Utc).naive_utc()));
        }

        for format in OFFSET_DATETIME_FORMATS {
            if let Ok(parsed) = DateTime::parse_from_str(raw, format) {
                return Ok(Self::format(parsed.with_timezone(&Utc).naive_utc()));
            }
        }

        for format in NAIVE_DATETIME_FORMATS {
            if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
                return Ok(Self::format(parsed));
            }
        }

        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
                return Ok(Self::format(midnight));
            }
        }

        Err(TrackerError::invalid_timestamp(raw))
    }

    /// 用于比较的时间：能规范化则规范化，否则保留原值
    pub fn comparable(raw: &str) -> String {
        Self::normalize(raw).unwrap_or_else(|_| raw.to_string())
    }

    fn format(value: NaiveDateTime) -> String {
        value.format(CANONICAL_EVENT_TIME_FORMAT).to_string()
    }
}

/// 承运商匹配模式
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CarrierPattern {
    /// 通配符 `*`，匹配任意承运商
    Any,
    Code(String),
}

impl CarrierPattern {
    pub const WILDCARD: &'static str = "*";

    pub fn parse(pattern: &str) -> Self {
        match pattern.trim() {
            Self::WILDCARD => CarrierPattern::Any,
            code => CarrierPattern::Code(code.to_string()),
        }
    }

    pub fn matches(&self, carrier: &str) -> bool {
        match self {
            CarrierPattern::Any => true,
            CarrierPattern::Code(code) => code == carrier,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, CarrierPattern::Any)
    }
}

impl fmt::Display for CarrierPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CarrierPattern::Any => f.write_str(Self::WILDCARD),
            CarrierPattern::Code(code) => f.write_str(code),
        }
    }
}

/// 追踪服务声明支持的承运商
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarrierSupport {
    pub pattern: CarrierPattern,
    pub priority: i32,
    pub display_name: Option<String>,
}

impl CarrierSupport {
    pub fn new(pattern: &str, priority: i32) -> Self {
        Self {
            pattern: CarrierPattern::parse(pattern),
            priority,
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }
}
