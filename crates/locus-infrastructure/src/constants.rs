//! Infrastructure layer constants

// ============================================================================
// Configuration
// ============================================================================

/// Prefix of configuration environment variables (`LOCUS_RUN_LEVEL__MAX_THREADS`)
pub const CONFIG_ENV_PREFIX: &str = "LOCUS";

/// Separator between nested keys in configuration environment variables
pub const CONFIG_ENV_SEPARATOR: &str = "__";

/// Default configuration file name
pub const DEFAULT_CONFIG_FILENAME: &str = "locus.toml";

/// Default configuration directory name
pub const DEFAULT_CONFIG_DIR: &str = "locus";

/// Name of the locator created by bootstrap when none is configured
pub const DEFAULT_LOCATOR_NAME: &str = "default";

// ============================================================================
// Logging
// ============================================================================

/// Environment variable overriding the log filter
pub const LOG_ENV_VAR: &str = "LOCUS_LOG";

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// File stem of rolling log files when the configured path has none
pub const DEFAULT_LOG_FILE_STEM: &str = "locus";

// ============================================================================
// Run levels
// ============================================================================

/// Default bound on workers activating one level
pub const DEFAULT_MAX_THREADS: usize = 4;

/// Name prefix of threads started by the default executor
pub const RUN_LEVEL_THREAD_PREFIX: &str = "locus-runlevel";

// ============================================================================
// Descriptor files
// ============================================================================

/// Extension of descriptor files picked up from directories
pub const DESCRIPTOR_FILE_EXTENSION: &str = "locus";

/// Comment marker in descriptor files
pub const COMMENT_PREFIX: char = '#';
