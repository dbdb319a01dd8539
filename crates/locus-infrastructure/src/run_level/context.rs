//! Run-level scope context
//!
//! Instances of run-level services live here until their level is brought
//! down. Failed activations are remembered so that retrying a transition
//! reports the earlier failure instead of running the construction again.

use super::{RunLevelMode, level_of, mode_of};
use locus_application::ActiveDescriptor;
use locus_application::contexts::{InstanceCache, WaitObserver};
use locus_application::ports::{Context, CreatedInstance, InstanceCreator};
use locus_domain::constants::{INITIAL_RUN_LEVEL, RUN_LEVEL_SCOPE};
use locus_domain::value_objects::{DescriptorId, Instance};
use locus_domain::{Error, MultiError, MultiResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Levels shared between the controller and its context
#[derive(Debug)]
pub(crate) struct LevelState {
    current: AtomicI32,
    activating: AtomicI32,
}

impl LevelState {
    pub(crate) fn new() -> Self {
        Self {
            current: AtomicI32::new(INITIAL_RUN_LEVEL),
            activating: AtomicI32::new(INITIAL_RUN_LEVEL),
        }
    }

    pub(crate) fn current(&self) -> i32 {
        self.current.load(Ordering::Acquire)
    }

    pub(crate) fn activating(&self) -> i32 {
        self.activating.load(Ordering::Acquire)
    }

    pub(crate) fn begin_level(&self, level: i32) {
        self.activating.store(level, Ordering::Release);
    }

    pub(crate) fn settle(&self, level: i32) {
        self.current.store(level, Ordering::Release);
        self.activating.store(level, Ordering::Release);
    }
}

/// Blocked-worker bookkeeping for the level being activated
#[derive(Debug, Default)]
pub(crate) struct BlockedWorkers {
    blocked: AtomicUsize,
    peak: AtomicUsize,
}

impl BlockedWorkers {
    pub(crate) fn reset(&self) {
        self.blocked.store(0, Ordering::Release);
        self.peak.store(0, Ordering::Release);
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }
}

impl WaitObserver for BlockedWorkers {
    fn on_block(&self, _descriptor: &ActiveDescriptor) {
        let now = self.blocked.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);
    }

    fn on_unblock(&self, _descriptor: &ActiveDescriptor) {
        self.blocked.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Context for the `RunLevel` scope
pub struct RunLevelContext {
    cache: InstanceCache,
    failures: Mutex<HashMap<DescriptorId, (i32, MultiError)>>,
    state: Arc<LevelState>,
    blocked: BlockedWorkers,
    default_mode: RunLevelMode,
}

impl RunLevelContext {
    pub(crate) fn new(state: Arc<LevelState>, default_mode: RunLevelMode) -> Self {
        Self {
            cache: InstanceCache::new(),
            failures: Mutex::new(HashMap::new()),
            state,
            blocked: BlockedWorkers::default(),
            default_mode,
        }
    }

    /// Number of live run-level instances
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Number of remembered activation failures
    pub fn failure_count(&self) -> usize {
        self.failures.lock().len()
    }

    pub(crate) fn blocked_workers(&self) -> &BlockedWorkers {
        &self.blocked
    }

    /// Destroy every instance declared at `level`, newest first
    pub(crate) fn destroy_level(&self, level: i32) -> usize {
        let taken = self
            .cache
            .take_where(|descriptor| level_of(descriptor).is_ok_and(|own| own == level));
        destroy_all(&taken);
        taken.len()
    }

    /// Destroy every instance declared above `level`, highest level first
    pub(crate) fn destroy_above(&self, level: i32) -> usize {
        let mut taken = self
            .cache
            .take_where(|descriptor| level_of(descriptor).is_ok_and(|own| own > level));
        // newest-first order is kept within each level
        taken.sort_by_key(|created| {
            std::cmp::Reverse(level_of(created.descriptor()).unwrap_or(level))
        });
        destroy_all(&taken);
        taken.len()
    }

    /// Forget failures of descriptors declared above `level`
    pub(crate) fn forget_failures_above(&self, level: i32) {
        self.failures.lock().retain(|_, (own, _)| *own <= level);
    }

    fn remembered_failure(&self, descriptor: &ActiveDescriptor) -> Option<MultiError> {
        self.failures
            .lock()
            .get(&descriptor.id())
            .map(|(_, error)| error.clone())
    }
}

fn destroy_all(taken: &[Arc<CreatedInstance>]) {
    for created in taken {
        debug!(descriptor = %created.descriptor(), "Destroying run level service");
        if let Err(e) = created.destroy() {
            warn!(
                scope = RUN_LEVEL_SCOPE,
                descriptor = %created.descriptor(),
                error = %e,
                "Service destruction failed"
            );
        }
    }
}

impl Context for RunLevelContext {
    fn scope(&self) -> &str {
        RUN_LEVEL_SCOPE
    }

    fn find_or_create(
        &self,
        descriptor: &Arc<ActiveDescriptor>,
        creator: &dyn InstanceCreator,
    ) -> MultiResult<Instance> {
        if let Some(instance) = self.cache.find(descriptor) {
            return Ok(instance);
        }
        if let Some(error) = self.remembered_failure(descriptor) {
            return Err(error);
        }
        let level = level_of(descriptor)?;
        let mode = mode_of(descriptor, self.default_mode)?;
        let activating = self.state.activating();
        if mode == RunLevelMode::Validating && level > activating {
            return Err(Error::illegal_state(format!(
                "{descriptor} belongs to run level {level} but only level {activating} is active"
            ))
            .into());
        }
        self.cache
            .find_or_create(descriptor, creator, Some(&self.blocked))
            .inspect_err(|error| {
                self.failures
                    .lock()
                    .insert(descriptor.id(), (level, error.clone()));
            })
    }

    fn contains(&self, descriptor: &ActiveDescriptor) -> bool {
        self.cache.contains(descriptor)
    }

    fn destroy_one(&self, descriptor: &ActiveDescriptor) {
        if let Some(created) = self.cache.take(descriptor) {
            destroy_all(&[created]);
        }
        self.failures.lock().remove(&descriptor.id());
    }

    fn shutdown(&self) {
        destroy_all(&self.cache.take_all());
        self.failures.lock().clear();
        self.state.settle(INITIAL_RUN_LEVEL);
    }
}

impl fmt::Debug for RunLevelContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunLevelContext")
            .field("live", &self.cache.len())
            .field("failures", &self.failure_count())
            .field("current", &self.state.current())
            .finish()
    }
}
