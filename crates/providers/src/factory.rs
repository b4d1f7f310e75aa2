use std::sync::Arc;

use tracing::{info, warn};

use trackbert_config::ProvidersConfig;
use trackbert_domain::ports::TrackingProvider;

use crate::keydelivery::KeyDeliveryProvider;

/// 根据配置构建启用的追踪服务，顺序即注册顺序
///
/// 创建失败的服务只记录日志并跳过，不影响其他服务。
pub struct ProviderFactory;

impl ProviderFactory {
    pub fn from_config(config: &ProvidersConfig) -> Vec<Arc<dyn TrackingProvider>> {
        let mut providers: Vec<Arc<dyn TrackingProvider>> = Vec::new();

        if config.keydelivery.enabled {
            match KeyDeliveryProvider::new(&config.keydelivery) {
                Ok(provider) => {
                    providers.push(Arc::new(provider));
                    info!("已加载追踪服务: keydelivery");
                }
                Err(e) => warn!("追踪服务 keydelivery 创建失败，已跳过: {}", e),
            }
        }

        providers
    }
}
