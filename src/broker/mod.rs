pub mod engine;
pub mod registry;

pub use engine::Broker;
pub use registry::SubscriptionRegistry;
