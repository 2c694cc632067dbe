//! Configuration for a full Keel engine instance (§4 ambient
//! configuration layer).

pub mod config;

pub use config::{InstanceConfig, SystemConfig};
