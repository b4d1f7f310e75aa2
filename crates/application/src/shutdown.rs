use tokio::sync::watch;

/// 关闭信号的接收端
///
/// 基于 `watch` 通道，克隆后每个并发任务都能看到同一个关闭状态，
/// 订阅晚于关闭的接收端也会立即得到通知。
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    /// 永远不会触发的信号，用于单次运行和测试
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        // 发送端释放后 `triggered` 会一直挂起
        drop(tx);
        Self { rx }
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// 等待关闭信号
    pub async fn triggered(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
