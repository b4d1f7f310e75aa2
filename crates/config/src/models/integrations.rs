use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersConfig {
    pub keydelivery: KeyDeliveryConfig,
}

impl ConfigValidator for ProvidersConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        self.keydelivery.validate()
    }
}

/// KeyDelivery (kd100) 追踪服务
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyDeliveryConfig {
    pub enabled: bool,
    pub api_key: String,
    pub api_secret: String,
    pub base_url: String,
    /// 注册到每个承运商时使用的优先级
    pub priority: i32,
}

impl Default for KeyDeliveryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            api_secret: String::new(),
            base_url: "https://www.kd100.com/api/v1".to_string(),
            priority: 1,
        }
    }
}

impl ConfigValidator for KeyDeliveryConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        if !self.enabled {
            return Ok(());
        }
        ValidationUtils::validate_not_empty(&self.api_key, "providers.keydelivery.api_key")?;
        ValidationUtils::validate_not_empty(&self.api_secret, "providers.keydelivery.api_secret")?;
        ValidationUtils::validate_url(&self.base_url, "providers.keydelivery.base_url")?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NotifiersConfig {
    pub notify_send: NotifySendConfig,
    /// 未配置时不启用Matrix通知
    pub matrix: Option<MatrixConfig>,
}

impl ConfigValidator for NotifiersConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        self.notify_send.validate()?;
        if let Some(matrix) = &self.matrix {
            matrix.validate()?;
        }
        Ok(())
    }
}

/// 桌面通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifySendConfig {
    pub enabled: bool,
    /// 普通通知的显示时长，紧急通知不设超时
    pub timeout_ms: u64,
    pub icon: Option<String>,
}

impl Default for NotifySendConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: 5000,
            icon: None,
        }
    }
}

impl ConfigValidator for NotifySendConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        Ok(())
    }
}

/// Matrix聊天室通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixConfig {
    pub homeserver: String,
    pub room_id: String,
    pub token: String,
}

impl ConfigValidator for MatrixConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_url(&self.homeserver, "notifiers.matrix.homeserver")?;
        ValidationUtils::validate_not_empty(&self.room_id, "notifiers.matrix.room_id")?;
        ValidationUtils::validate_not_empty(&self.token, "notifiers.matrix.token")?;
        Ok(())
    }
}
