use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://trackbert.db".to_string(),
            max_connections: 5,
            connection_timeout_seconds: 30,
        }
    }
}

impl ConfigValidator for DatabaseConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_not_empty(&self.url, "database.url")?;
        if !self.url.starts_with("sqlite:") {
            return Err(crate::ConfigError::Validation(format!(
                "database.url must be a sqlite URL, got: {}",
                self.url
            )));
        }
        ValidationUtils::validate_count(
            self.max_connections as usize,
            "database.max_connections",
            100,
        )?;
        ValidationUtils::validate_seconds(
            self.connection_timeout_seconds,
            "database.connection_timeout_seconds",
        )?;
        Ok(())
    }
}
