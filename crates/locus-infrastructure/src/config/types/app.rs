//! Top-level configuration

use super::{LoggingConfig, RunLevelConfig};
use crate::constants::DEFAULT_LOCATOR_NAME;
use crate::factory::CreatePolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Service locator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Name registered with the locator factory
    pub name: String,

    /// Name of an already created parent locator
    pub parent: Option<String>,

    /// What to do when a locator with the same name already exists
    pub create_policy: CreatePolicy,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_LOCATOR_NAME.to_string(),
            parent: None,
            create_policy: CreatePolicy::Error,
        }
    }
}

/// Descriptor files loaded at bootstrap
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulatorConfig {
    /// Individual descriptor files
    pub files: Vec<PathBuf>,

    /// Directories scanned for `*.locus` files
    pub directories: Vec<PathBuf>,
}

/// Complete runtime configuration
///
/// # Example
///
/// ```toml
/// [locator]
/// name = "app"
///
/// [run_level]
/// max_threads = 2
/// threading_policy = "fully-threaded"
///
/// [populator]
/// files = ["services.locus"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocusConfig {
    /// Service locator settings
    pub locator: LocatorConfig,

    /// Run-level controller settings
    pub run_level: RunLevelConfig,

    /// Descriptor file sources
    pub populator: PopulatorConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}
