use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("数据库操作错误: {0}")]
    DatabaseOperation(String),
    #[error("包裹未找到: {tracking_number}")]
    ShipmentNotFound { tracking_number: String },
    #[error("包裹已存在: {tracking_number}")]
    ShipmentExists { tracking_number: String },
    #[error("追踪服务 {provider} 错误: {message}")]
    Provider { provider: String, message: String },
    #[error("追踪服务查询超时 ({seconds}s)")]
    FetchTimeout { seconds: u64 },
    #[error("通知渠道 {notifier} 错误: {message}")]
    Notifier { notifier: String, message: String },
    #[error("网络错误: {0}")]
    Network(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("无效的时间戳: {0}")]
    InvalidTimestamp(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type TrackerResult<T> = Result<T, TrackerError>;

impl TrackerError {
    pub fn database_error<S: Into<String>>(msg: S) -> Self {
        Self::DatabaseOperation(msg.into())
    }
    pub fn shipment_not_found<S: Into<String>>(tracking_number: S) -> Self {
        Self::ShipmentNotFound {
            tracking_number: tracking_number.into(),
        }
    }
    pub fn shipment_exists<S: Into<String>>(tracking_number: S) -> Self {
        Self::ShipmentExists {
            tracking_number: tracking_number.into(),
        }
    }
    pub fn provider_error<P: Into<String>, M: Into<String>>(provider: P, message: M) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }
    pub fn notifier_error<N: Into<String>, M: Into<String>>(notifier: N, message: M) -> Self {
        Self::Notifier {
            notifier: notifier.into(),
            message: message.into(),
        }
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn invalid_timestamp<S: Into<String>>(raw: S) -> Self {
        Self::InvalidTimestamp(raw.into())
    }
    /// 只有外层循环无法继续时才视为致命错误
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TrackerError::Internal(_) | TrackerError::Configuration(_)
        )
    }
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TrackerError::Database(_)
                | TrackerError::DatabaseOperation(_)
                | TrackerError::Provider { .. }
                | TrackerError::FetchTimeout { .. }
                | TrackerError::Network(_)
        )
    }
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            TrackerError::Database(_) | TrackerError::DatabaseOperation(_)
        )
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(err: serde_json::Error) -> Self {
        TrackerError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for TrackerError {
    fn from(err: reqwest::Error) -> Self {
        TrackerError::Network(err.to_string())
    }
}

impl From<anyhow::Error> for TrackerError {
    fn from(err: anyhow::Error) -> Self {
        TrackerError::Internal(err.to_string())
    }
}
