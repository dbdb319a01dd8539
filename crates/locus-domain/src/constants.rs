//! Domain constants
//!
//! Scope identifiers and well-known metadata keys shared by every layer.

// ============================================================================
// SCOPES
// ============================================================================

/// One instance per locator, created on first demand
pub const SINGLETON_SCOPE: &str = "Singleton";

/// A fresh instance for every lookup or injection
pub const PER_LOOKUP_SCOPE: &str = "PerLookup";

/// One instance per thread
pub const PER_THREAD_SCOPE: &str = "PerThread";

/// Instances activated and deactivated by the run-level controller
pub const RUN_LEVEL_SCOPE: &str = "RunLevel";

/// Scope given to descriptors that do not name one
pub const DEFAULT_SCOPE: &str = PER_LOOKUP_SCOPE;

// ============================================================================
// RANKING
// ============================================================================

/// Rank given to descriptors that do not set one
pub const DEFAULT_RANK: i32 = 0;

// ============================================================================
// RUN LEVEL METADATA
// ============================================================================

/// Metadata key holding the declared run level of a descriptor
pub const RUN_LEVEL_VALUE_KEY: &str = "runLevelValue";

/// Metadata key holding the run-level activation mode of a descriptor
pub const RUN_LEVEL_MODE_KEY: &str = "runLevelMode";

/// Creation outside the level being activated is rejected
pub const RUN_LEVEL_MODE_VALIDATING: &str = "validating";

/// Creation is allowed whenever the service is looked up
pub const RUN_LEVEL_MODE_ON_DEMAND: &str = "on-demand";

/// Level a controller reports before anything has been activated
pub const INITIAL_RUN_LEVEL: i32 = -2;

/// Level given to run-level descriptors without a declared value
pub const DEFAULT_RUN_LEVEL: i32 = 0;
