pub mod notification_dispatcher;
pub mod notifier_registry;
pub mod provider_registry;

pub use notification_dispatcher::*;
pub use notifier_registry::*;
pub use provider_registry::*;
