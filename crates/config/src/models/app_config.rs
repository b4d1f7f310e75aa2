use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    database::DatabaseConfig,
    integrations::{NotifiersConfig, ProvidersConfig},
    logging::{LoggingConfig, MetricsConfig},
    tracker::TrackerConfig,
};
use crate::validation::ConfigValidator;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub tracker: TrackerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
    pub providers: ProvidersConfig,
    pub notifiers: NotifiersConfig,
}

impl AppConfig {
    /// 加载配置：TOML文件 + `TRACKBERT_` 环境变量覆盖
    ///
    /// 环境变量使用双下划线分隔层级，例如 `TRACKBERT_TRACKER__INTERVAL_SECONDS=120`。
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = ["config.toml", "trackbert.toml"];
            for path in &default_paths {
                if Path::new(path).exists() {
                    builder = builder.add_source(File::new(path, FileFormat::Toml));
                    break;
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("TRACKBERT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    /// `--generate-config` 写出的默认配置
    pub fn default_toml() -> Result<String> {
        Self::default().to_toml()
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        self.tracker.validate()?;
        self.database.validate()?;
        self.logging.validate()?;
        self.metrics.validate()?;
        self.providers.validate()?;
        self.notifiers.validate()?;
        Ok(())
    }
}
