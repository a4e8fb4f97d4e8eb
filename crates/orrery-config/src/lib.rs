//! Configuration system for the orrery tile and culling core.
//!
//! Provides runtime-configurable settings that persist to disk as RON files.
//! Supports hot-reload detection and forward/backward compatible
//! serialization: missing sections fall back to their defaults and unknown
//! fields are ignored.

mod config;
mod error;

pub use config::{Config, CullConfig, DebugConfig, TileConfig};
pub use error::ConfigError;
