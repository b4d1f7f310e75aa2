//! 外部能力接口
//!
//! 追踪服务和通知渠道都是外部协作者，核心逻辑只依赖这里定义的接口：
//! - `TrackingProvider`: 按承运商查询包裹事件
//! - `Notifier`: 向用户发送提醒

use async_trait::async_trait;

use crate::entities::ObservedEvent;
use crate::value_objects::CarrierSupport;
use trackbert_errors::TrackerResult;

/// 包裹追踪服务
#[async_trait]
pub trait TrackingProvider: Send + Sync {
    /// 服务名称，用于日志
    fn name(&self) -> &str;

    /// 声明支持的承运商及优先级，启动时调用一次
    async fn supported_carriers(&self) -> TrackerResult<Vec<CarrierSupport>>;

    /// 查询包裹事件
    ///
    /// 返回的事件不带包裹ID，由调用方补齐。空列表表示没有更新。
    async fn fetch_events(
        &self,
        tracking_number: &str,
        carrier: &str,
    ) -> TrackerResult<Vec<ObservedEvent>>;
}

/// 通知渠道
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    /// 是否可用，仅在启动时检查一次
    async fn enabled(&self) -> bool;

    async fn notify(&self, title: &str, message: &str, urgent: bool) -> TrackerResult<()>;
}
