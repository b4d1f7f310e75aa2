use std::sync::Arc;

use tracing::{info, warn};

use trackbert_domain::ports::Notifier;

/// 启用的通知渠道集合
///
/// `enabled` 只在构建时检查一次，被禁用的渠道在整个进程生命周期内都不会收到通知。
#[derive(Default)]
pub struct NotifierRegistry {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl NotifierRegistry {
    pub async fn from_notifiers(candidates: Vec<Arc<dyn Notifier>>) -> Self {
        let mut notifiers = Vec::with_capacity(candidates.len());

        for notifier in candidates {
            if notifier.enabled().await {
                info!("启用通知渠道: {}", notifier.name());
                notifiers.push(notifier);
            } else {
                info!("通知渠道 {} 未启用", notifier.name());
            }
        }

        if notifiers.is_empty() {
            warn!("没有可用的通知渠道，新事件只会写入日志");
        }

        Self { notifiers }
    }

    pub fn active(&self) -> &[Arc<dyn Notifier>] {
        &self.notifiers
    }

    pub fn names(&self) -> Vec<&str> {
        self.notifiers.iter().map(|n| n.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}
