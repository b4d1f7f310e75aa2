pub mod cycle_report;
pub mod reconciliation_engine;

pub use cycle_report::*;
pub use reconciliation_engine::*;
