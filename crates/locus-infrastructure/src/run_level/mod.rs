//! Run levels
//!
//! Descriptors bound in the `RunLevel` scope declare an integer level in
//! their `runLevelValue` metadata. The [`RunLevelController`] activates
//! them level by level, ascending, on a bounded set of workers, and
//! destroys them level by level, descending, on the driving thread.
//!
//! | Component | Role |
//! |-----------|------|
//! | [`RunLevelContext`] | Scope context caching run-level instances and memoizing failures |
//! | [`RunLevelController`] | Transition state machine |
//! | [`RunLevelFuture`] | Handle to one transition: cancel, wait, wait with timeout |
//! | [`RunLevelListener`] | Progress, cancellation and error notifications |
//! | [`Executor`] | Where level workers run |

pub mod context;
pub mod controller;
pub mod executor;
pub mod future;
pub mod listener;

pub use context::RunLevelContext;
pub use controller::{LevelStatistics, RunLevelController};
pub use executor::{Executor, Job, ThreadExecutor, rayon_pool};
pub use future::RunLevelFuture;
pub use listener::{ErrorAction, LevelErrorInformation, RunLevelListener};

use locus_domain::constants::{
    DEFAULT_RUN_LEVEL, RUN_LEVEL_MODE_KEY, RUN_LEVEL_MODE_ON_DEMAND, RUN_LEVEL_MODE_VALIDATING,
    RUN_LEVEL_VALUE_KEY,
};
use locus_domain::error::{Error, Result};
use locus_domain::value_objects::Descriptor;
use serde::{Deserialize, Serialize};

/// When a run-level service may be created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunLevelMode {
    /// Only while its level is being activated or once it has been reached
    #[default]
    Validating,
    /// Whenever it is looked up
    OnDemand,
}

/// Whether transitions use worker threads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThreadingPolicy {
    /// Async transitions get a driver thread; levels run on the executor
    #[default]
    FullyThreaded,
    /// Everything runs on the calling thread
    UseNoThreads,
}

/// Level declared by a run-level descriptor
pub fn level_of(descriptor: &Descriptor) -> Result<i32> {
    match descriptor.metadata_value(RUN_LEVEL_VALUE_KEY) {
        None => Ok(DEFAULT_RUN_LEVEL),
        Some(raw) => raw.trim().parse().map_err(|_| {
            Error::invalid_argument(format!(
                "{descriptor} declares run level {raw:?}, which is not an integer"
            ))
        }),
    }
}

/// Mode declared by a run-level descriptor, or `default`
pub fn mode_of(descriptor: &Descriptor, default: RunLevelMode) -> Result<RunLevelMode> {
    match descriptor.metadata_value(RUN_LEVEL_MODE_KEY) {
        None => Ok(default),
        Some(RUN_LEVEL_MODE_VALIDATING) => Ok(RunLevelMode::Validating),
        Some(RUN_LEVEL_MODE_ON_DEMAND) => Ok(RunLevelMode::OnDemand),
        Some(other) => Err(Error::invalid_argument(format!(
            "{descriptor} declares unknown run level mode {other:?}"
        ))),
    }
}
