//! Builders
//!
//! Fluent builder for the client configuration.

pub mod config;

pub use config::{spotikit_config, SpotikitConfigBuilder};
