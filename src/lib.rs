pub mod app;
pub mod cli;
pub mod shutdown;

pub use app::{Application, ShipmentAction};
pub use cli::{build_cli, parse_command, CliCommand};
pub use shutdown::ShutdownManager;
