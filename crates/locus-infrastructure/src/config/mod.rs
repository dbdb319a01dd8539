//! Configuration management
//!
//! Layered figment configuration: defaults, then a TOML file, then
//! `LOCUS_`-prefixed environment variables.

pub mod loader;
pub mod types;

pub use loader::{ConfigBuilder, ConfigLoader};
pub use types::{LocatorConfig, LocusConfig, LoggingConfig, PopulatorConfig, RunLevelConfig};
