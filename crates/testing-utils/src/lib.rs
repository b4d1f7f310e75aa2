//! # Trackbert Testing Utils
//!
//! 工作区共用的测试替身：
//!
//! - **Mock存储**: 内存实现的 `EventStore` / `ShipmentRepository`，可注入写入失败
//! - **Mock追踪服务**: 可配置返回事件、延迟和错误，并统计并发调用
//! - **Mock通知渠道**: 记录收到的通知
//! - **数据构建器**: 包裹和事件的测试数据
//!
//! ```toml
//! [dev-dependencies]
//! trackbert-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
