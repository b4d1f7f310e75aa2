use std::time::Duration;

/// 单个包裹在一个周期内的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShipmentOutcome {
    /// 未设置承运商
    Skipped,
    /// 没有匹配的追踪服务
    NoProvider,
    FetchFailed,
    TimedOut,
    /// 没有新事件
    UpToDate,
    Processed { new_events: usize },
    /// 写入失败，放弃剩余事件；`persisted` 为失败前已写入的数量
    StoreFailed { persisted: usize },
    /// 收到关闭信号
    Cancelled { persisted: usize },
}

impl ShipmentOutcome {
    pub fn persisted(&self) -> usize {
        match self {
            ShipmentOutcome::Processed { new_events } => *new_events,
            ShipmentOutcome::StoreFailed { persisted }
            | ShipmentOutcome::Cancelled { persisted } => *persisted,
            _ => 0,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ShipmentOutcome::FetchFailed
                | ShipmentOutcome::TimedOut
                | ShipmentOutcome::StoreFailed { .. }
        )
    }
}

/// 一个对账周期的汇总
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: String,
    /// (单号, 结果)，顺序为完成顺序
    pub outcomes: Vec<(String, ShipmentOutcome)>,
    pub duration: Duration,
}

impl CycleReport {
    pub fn shipment_count(&self) -> usize {
        self.outcomes.len()
    }

    pub fn new_events(&self) -> usize {
        self.outcomes.iter().map(|(_, o)| o.persisted()).sum()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_failure()).count()
    }

    pub fn processed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, ShipmentOutcome::Processed { .. } | ShipmentOutcome::UpToDate))
            .count()
    }

    pub fn outcome_for(&self, tracking_number: &str) -> Option<&ShipmentOutcome> {
        self.outcomes
            .iter()
            .find(|(t, _)| t == tracking_number)
            .map(|(_, o)| o)
    }
}
