pub mod factory;
pub mod keydelivery;

pub use factory::ProviderFactory;
pub use keydelivery::KeyDeliveryProvider;
