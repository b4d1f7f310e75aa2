pub mod factory;
pub mod matrix;
pub mod notify_send;

pub use factory::NotifierFactory;
pub use matrix::MatrixNotifier;
pub use notify_send::NotifySendNotifier;
