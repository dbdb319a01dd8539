//! Instance cache shared by the retaining contexts
//!
//! Each descriptor gets a slot guarded by a mutex and a condition variable.
//! The first thread to find a slot vacant marks it as being created and
//! builds the instance outside the lock; later threads wait on the
//! condition variable and observe the same outcome. A failed creation is
//! reported to every thread that waited for it, and the next request after
//! that starts over.

use crate::ports::{CreatedInstance, InstanceCreator};
use crate::reification::{CreationStack, WaitGraph};
use crate::registry::ActiveDescriptor;
use dashmap::DashMap;
use locus_domain::value_objects::{DescriptorId, Instance};
use locus_domain::{MultiError, MultiResult};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};
use tracing::warn;

/// Hook around the time a thread spends waiting for another thread's
/// construction
pub trait WaitObserver: Sync {
    fn on_block(&self, descriptor: &ActiveDescriptor);
    fn on_unblock(&self, descriptor: &ActiveDescriptor);
}

enum SlotState {
    Vacant,
    Creating { owner: ThreadId, attempt: u64 },
    Ready { created: Arc<CreatedInstance>, sequence: u64 },
    Failed { attempt: u64, error: MultiError },
}

struct Slot {
    state: Mutex<SlotState>,
    changed: Condvar,
}

/// Per-descriptor instance cache with single-flight construction
#[derive(Default)]
pub struct InstanceCache {
    slots: DashMap<DescriptorId, Arc<Slot>>,
    attempts: AtomicU64,
    completed: AtomicU64,
}

impl InstanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached instance of `descriptor`, created through `creator` if needed
    pub fn find_or_create(
        &self,
        descriptor: &Arc<ActiveDescriptor>,
        creator: &dyn InstanceCreator,
        observer: Option<&dyn WaitObserver>,
    ) -> MultiResult<Instance> {
        let slot = Arc::clone(
            self.slots
                .entry(descriptor.id())
                .or_insert_with(|| {
                    Arc::new(Slot {
                        state: Mutex::new(SlotState::Vacant),
                        changed: Condvar::new(),
                    })
                })
                .value(),
        );
        let me = thread::current().id();
        let mut awaited: Option<u64> = None;
        let mut state = slot.state.lock();
        let attempt = loop {
            match &*state {
                SlotState::Ready { created, .. } => return Ok(created.instance().clone()),
                SlotState::Failed { attempt, error } if awaited == Some(*attempt) => {
                    return Err(error.clone());
                }
                SlotState::Creating { owner, .. } if *owner == me => {
                    return Err(CreationStack::cycle_error(descriptor).into());
                }
                SlotState::Creating { owner, attempt } => {
                    let attempt = *attempt;
                    let _edge = WaitGraph::register(*owner, descriptor)?;
                    if let Some(observer) = observer {
                        observer.on_block(descriptor);
                    }
                    slot.changed.wait(&mut state);
                    if let Some(observer) = observer {
                        observer.on_unblock(descriptor);
                    }
                    awaited = Some(attempt);
                }
                SlotState::Vacant | SlotState::Failed { .. } => {
                    let attempt = self.attempts.fetch_add(1, Ordering::Relaxed);
                    *state = SlotState::Creating { owner: me, attempt };
                    break attempt;
                }
            }
        };
        drop(state);

        let mut pending = PendingCreation {
            slot: &slot,
            finished: false,
        };
        let outcome = creator.create(descriptor);
        let mut state = slot.state.lock();
        pending.finished = true;
        let result = match outcome {
            Ok(created) => {
                let instance = created.instance().clone();
                let sequence = self.completed.fetch_add(1, Ordering::AcqRel);
                *state = SlotState::Ready {
                    created: Arc::new(created),
                    sequence,
                };
                Ok(instance)
            }
            Err(error) => {
                *state = SlotState::Failed {
                    attempt,
                    error: error.clone(),
                };
                Err(error)
            }
        };
        drop(state);
        slot.changed.notify_all();
        result
    }

    /// Cached instance of `descriptor`, without creating one
    pub fn find(&self, descriptor: &ActiveDescriptor) -> Option<Instance> {
        let slot = self.slots.get(&descriptor.id())?.value().clone();
        let state = slot.state.lock();
        match &*state {
            SlotState::Ready { created, .. } => Some(created.instance().clone()),
            _ => None,
        }
    }

    /// Whether a finished instance of `descriptor` is cached
    pub fn contains(&self, descriptor: &ActiveDescriptor) -> bool {
        self.find(descriptor).is_some()
    }

    /// Number of finished instances
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(&*slot.value().state.lock(), SlotState::Ready { .. }))
            .count()
    }

    /// Whether no finished instance is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take the finished instance of one descriptor out of the cache
    ///
    /// A slot still being created stays in place, so its instance is cached
    /// and later destroyed with the rest.
    pub fn take(&self, descriptor: &ActiveDescriptor) -> Option<Arc<CreatedInstance>> {
        let (_, slot) = self.slots.remove_if(&descriptor.id(), |_, slot| {
            matches!(&*slot.state.lock(), SlotState::Ready { .. })
        })?;
        let mut state = slot.state.lock();
        match std::mem::replace(&mut *state, SlotState::Vacant) {
            SlotState::Ready { created, .. } => Some(created),
            _ => None,
        }
    }

    /// Take every finished instance selected by `select`, newest first
    pub fn take_where<F>(&self, select: F) -> Vec<Arc<CreatedInstance>>
    where
        F: Fn(&ActiveDescriptor) -> bool,
    {
        let mut taken: Vec<(u64, Arc<CreatedInstance>)> = Vec::new();
        self.slots.retain(|_, slot| {
            let mut state = slot.state.lock();
            // creating slots stay so the instance they finish is not lost
            let selected = match &*state {
                SlotState::Ready { created, .. } => select(&**created.descriptor()),
                SlotState::Failed { .. } => true,
                SlotState::Vacant | SlotState::Creating { .. } => false,
            };
            if !selected {
                return true;
            }
            if let SlotState::Ready { created, sequence } =
                std::mem::replace(&mut *state, SlotState::Vacant)
            {
                taken.push((sequence, created));
            }
            false
        });
        taken.sort_by(|a, b| b.0.cmp(&a.0));
        taken.into_iter().map(|(_, created)| created).collect()
    }

    /// Take every finished instance, newest first
    pub fn take_all(&self) -> Vec<Arc<CreatedInstance>> {
        self.take_where(|_| true)
    }

    /// Destroy every finished instance, newest first
    pub fn destroy_all(&self, scope: &str) {
        for created in self.take_all() {
            destroy_logged(scope, &created);
        }
    }
}

/// Destroy one instance, logging failures
pub(crate) fn destroy_logged(scope: &str, created: &CreatedInstance) {
    if let Err(e) = created.destroy() {
        warn!(
            scope,
            descriptor = %created.descriptor(),
            error = %e,
            "Service destruction failed"
        );
    }
}

/// Resets a slot left in the creating state by a panicking creator
struct PendingCreation<'a> {
    slot: &'a Slot,
    finished: bool,
}

impl Drop for PendingCreation<'_> {
    fn drop(&mut self) {
        if !self.finished {
            *self.slot.state.lock() = SlotState::Vacant;
            self.slot.changed.notify_all();
        }
    }
}
