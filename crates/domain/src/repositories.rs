//! 领域仓储抽象
//!
//! 定义数据访问的抽象接口，遵循依赖倒置原则

use async_trait::async_trait;

use crate::entities::{Event, NewShipment, ObservedEvent, Shipment};
use trackbert_errors::TrackerResult;

/// 对账引擎使用的事件存储
#[async_trait]
pub trait EventStore: Send + Sync {
    /// 当前周期需要处理的包裹快照
    async fn list_tracked_shipments(&self) -> TrackerResult<Vec<Shipment>>;

    /// 时间最新的已知事件，没有事件时返回None
    async fn latest_event(&self, shipment_id: i64) -> TrackerResult<Option<Event>>;

    /// 追加一条事件，每次调用都是原子的
    async fn append_event(&self, shipment_id: i64, event: &ObservedEvent) -> TrackerResult<Event>;
}

/// 包裹管理仓储，供命令行操作使用
#[async_trait]
pub trait ShipmentRepository: Send + Sync {
    async fn create_shipment(&self, shipment: &NewShipment) -> TrackerResult<Shipment>;
    async fn get_shipment(&self, tracking_number: &str) -> TrackerResult<Option<Shipment>>;
    async fn update_shipment(
        &self,
        tracking_number: &str,
        carrier: Option<&str>,
        description: Option<&str>,
    ) -> TrackerResult<Shipment>;
    async fn disable_shipment(&self, tracking_number: &str) -> TrackerResult<()>;
    async fn shipment_events(&self, shipment_id: i64) -> TrackerResult<Vec<Event>>;
}
