use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use trackbert_application::{
    EngineConfig, NotificationDispatcher, NotifierRegistry, ProviderRegistry,
    ReconciliationEngine, ShutdownSignal,
};
use trackbert_config::AppConfig;
use trackbert_domain::entities::{NewShipment, Shipment};
use trackbert_domain::repositories::{EventStore, ShipmentRepository};
use trackbert_errors::TrackerError;
use trackbert_infrastructure::database::{DatabaseManager, SqliteEventStore};
use trackbert_infrastructure::observability::init_metrics;
use trackbert_notifiers::NotifierFactory;
use trackbert_providers::ProviderFactory;

/// 命令行对包裹的操作
#[derive(Debug, Clone, PartialEq)]
pub enum ShipmentAction {
    Create {
        tracking_number: String,
        carrier: String,
        description: Option<String>,
    },
    Update {
        tracking_number: String,
        carrier: Option<String>,
        description: Option<String>,
    },
    Disable {
        tracking_number: String,
    },
}

/// 主应用程序
pub struct Application {
    config: AppConfig,
    database: DatabaseManager,
    store: Arc<SqliteEventStore>,
}

impl Application {
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("初始化应用程序，数据库: {}", config.database.url);

        let database = DatabaseManager::from_config(&config.database)
            .await
            .with_context(|| format!("连接数据库失败: {}", config.database.url))?;
        let store = database.event_store();

        Ok(Self {
            config,
            database,
            store,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 执行包裹操作，返回操作后的包裹
    pub async fn apply(&self, action: ShipmentAction) -> Result<Shipment> {
        match action {
            ShipmentAction::Create {
                tracking_number,
                carrier,
                description,
            } => {
                let mut shipment = NewShipment::new(tracking_number.as_str(), carrier);
                if let Some(description) = description {
                    shipment = shipment.with_description(description);
                }
                match self.store.create_shipment(&shipment).await {
                    Ok(created) => Ok(created),
                    Err(TrackerError::ShipmentExists { .. }) => {
                        bail!("包裹 {tracking_number} 已存在，使用 -u 更新")
                    }
                    Err(e) => Err(e.into()),
                }
            }
            ShipmentAction::Update {
                tracking_number,
                carrier,
                description,
            } => match self
                .store
                .update_shipment(&tracking_number, carrier.as_deref(), description.as_deref())
                .await
            {
                Ok(updated) => Ok(updated),
                Err(TrackerError::ShipmentNotFound { .. }) => {
                    bail!("包裹 {tracking_number} 不存在，去掉 -u 以创建")
                }
                Err(e) => Err(e.into()),
            },
            ShipmentAction::Disable { tracking_number } => {
                self.store
                    .disable_shipment(&tracking_number)
                    .await
                    .with_context(|| format!("停止追踪包裹 {tracking_number} 失败"))?;
                self.store
                    .get_shipment(&tracking_number)
                    .await?
                    .with_context(|| format!("包裹 {tracking_number} 不存在"))
            }
        }
    }

    pub async fn provider_registry(&self) -> Result<ProviderRegistry> {
        let providers = ProviderFactory::from_config(&self.config.providers);
        if providers.is_empty() {
            warn!("没有启用任何追踪服务，请检查 [providers] 配置");
        }
        Ok(ProviderRegistry::from_providers(providers).await)
    }

    /// (承运商代码, 显示名称, 追踪服务)
    pub async fn list_carriers(&self) -> Result<Vec<(String, Option<String>, String)>> {
        Ok(self.provider_registry().await?.carrier_table())
    }

    /// 运行对账守护进程直到收到关闭信号
    pub async fn run(&self, shutdown: ShutdownSignal) -> Result<()> {
        if self.config.metrics.enabled {
            init_metrics(&self.config.metrics.bind_address)?;
        }

        let providers = Arc::new(self.provider_registry().await?);
        let notifiers = NotifierFactory::from_config(&self.config.notifiers);
        let notifier_registry = Arc::new(NotifierRegistry::from_notifiers(notifiers).await);
        let dispatcher = Arc::new(NotificationDispatcher::new(notifier_registry));

        if self.config.tracker.startup_notification {
            dispatcher.dispatch("Trackbert", "Starting up", false).await;
        }

        let store: Arc<dyn EventStore> = self.store.clone();
        let engine = ReconciliationEngine::new(
            store,
            providers,
            dispatcher,
            EngineConfig::from(&self.config.tracker),
        );

        engine.run(shutdown).await.context("对账引擎异常退出")?;
        Ok(())
    }

    pub async fn close(&self) {
        self.database.close().await;
        info!("数据库连接已关闭");
    }
}
