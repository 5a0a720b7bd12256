//! Core configuration
//!
//! Contains the bridge and loader configuration types

mod config;

pub use config::{BridgeConfig, ConfigError, DispatchMode, LoaderConfig};
