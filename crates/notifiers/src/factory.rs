use std::sync::Arc;

use tracing::{info, warn};

use trackbert_config::NotifiersConfig;
use trackbert_domain::ports::Notifier;

use crate::matrix::MatrixNotifier;
use crate::notify_send::NotifySendNotifier;

/// 根据配置构建通知渠道候选列表
///
/// 是否真正启用由 `NotifierRegistry` 在启动时检查。
/// 单个渠道创建失败只跳过该渠道。
pub struct NotifierFactory;

impl NotifierFactory {
    pub fn from_config(config: &NotifiersConfig) -> Vec<Arc<dyn Notifier>> {
        let mut notifiers: Vec<Arc<dyn Notifier>> =
            vec![Arc::new(NotifySendNotifier::new(&config.notify_send))];

        if let Some(matrix) = &config.matrix {
            match MatrixNotifier::new(matrix) {
                Ok(notifier) => {
                    notifiers.push(Arc::new(notifier));
                    info!("已配置Matrix通知: {}", matrix.room_id);
                }
                Err(e) => warn!("Matrix通知创建失败，已跳过: {}", e),
            }
        }

        notifiers
    }
}
