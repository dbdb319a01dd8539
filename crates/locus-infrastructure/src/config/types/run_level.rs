//! Run-level controller configuration types

use crate::constants::DEFAULT_MAX_THREADS;
use crate::run_level::{RunLevelMode, ThreadingPolicy};
use serde::{Deserialize, Serialize};

/// Run-level controller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunLevelConfig {
    /// Maximum workers activating one level
    pub max_threads: usize,

    /// Whether transitions use worker threads at all
    pub threading_policy: ThreadingPolicy,

    /// Mode of run-level descriptors that do not declare one
    pub default_mode: RunLevelMode,

    /// Upper bound on a synchronous transition, in seconds
    pub transition_timeout_secs: Option<u64>,
}

impl Default for RunLevelConfig {
    fn default() -> Self {
        Self {
            max_threads: DEFAULT_MAX_THREADS,
            threading_policy: ThreadingPolicy::FullyThreaded,
            default_mode: RunLevelMode::Validating,
            transition_timeout_secs: None,
        }
    }
}
