mod loader;

pub use loader::{Config, DeliveryConfig, EngineConfig, ExecConfig};
