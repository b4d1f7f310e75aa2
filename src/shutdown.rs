use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use trackbert_application::ShutdownSignal;

/// 优雅关闭管理器
#[derive(Clone)]
pub struct ShutdownManager {
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx: Arc::new(shutdown_tx),
        }
    }

    /// 订阅关闭信号，关闭之后订阅也会立即触发
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal::new(self.shutdown_tx.subscribe())
    }

    /// 触发关闭，重复调用无副作用
    pub fn shutdown(&self) {
        let changed = self.shutdown_tx.send_if_modified(|stopped| {
            if *stopped {
                false
            } else {
                *stopped = true;
                true
            }
        });

        if changed {
            info!(
                "触发系统关闭，通知 {} 个订阅者",
                self.shutdown_tx.receiver_count()
            );
        } else {
            debug!("关闭管理器已经触发过关闭");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_tx.borrow()
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}
