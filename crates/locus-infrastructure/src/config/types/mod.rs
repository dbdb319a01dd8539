//! Configuration types module

pub mod app;
pub mod logging;
pub mod run_level;

// Re-export main types
pub use app::{LocatorConfig, LocusConfig, PopulatorConfig};
pub use logging::LoggingConfig;
pub use run_level::RunLevelConfig;
