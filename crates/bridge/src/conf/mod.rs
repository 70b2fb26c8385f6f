//! Conf — bridge configuration (TOML file + environment overrides).

pub mod load;
pub mod model;

pub use model::BridgeConfig;
