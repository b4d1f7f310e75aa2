pub mod app_config;
pub mod database;
pub mod integrations;
pub mod logging;
pub mod tracker;

pub use app_config::*;
pub use database::*;
pub use integrations::*;
pub use logging::*;
pub use tracker::*;
