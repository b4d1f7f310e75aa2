pub mod services;
pub mod shutdown;
pub mod use_cases;

pub use services::*;
pub use shutdown::ShutdownSignal;
pub use use_cases::*;
