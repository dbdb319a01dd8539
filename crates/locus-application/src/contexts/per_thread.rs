//! Per-thread context
//!
//! One instance per descriptor per thread. Instances are destroyed when the
//! context shuts down, not when their thread exits.

use super::cache::destroy_logged;
use crate::ports::{Context, CreatedInstance, InstanceCreator};
use crate::registry::ActiveDescriptor;
use dashmap::DashMap;
use locus_domain::MultiResult;
use locus_domain::constants::PER_THREAD_SCOPE;
use locus_domain::value_objects::{DescriptorId, Instance};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};

/// Context of the `PerThread` scope
#[derive(Default)]
pub struct PerThreadContext {
    instances: DashMap<(ThreadId, DescriptorId), (u64, Arc<CreatedInstance>)>,
    completed: AtomicU64,
}

impl PerThreadContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(descriptor: &ActiveDescriptor) -> (ThreadId, DescriptorId) {
        (thread::current().id(), descriptor.id())
    }

    fn take_where<F>(&self, select: F) -> Vec<Arc<CreatedInstance>>
    where
        F: Fn(&(ThreadId, DescriptorId)) -> bool,
    {
        let mut taken = Vec::new();
        self.instances.retain(|key, (sequence, created)| {
            if select(key) {
                taken.push((*sequence, Arc::clone(created)));
                false
            } else {
                true
            }
        });
        taken.sort_by(|a, b| b.0.cmp(&a.0));
        taken.into_iter().map(|(_, created)| created).collect()
    }
}

impl Context for PerThreadContext {
    fn scope(&self) -> &str {
        PER_THREAD_SCOPE
    }

    fn find_or_create(
        &self,
        descriptor: &Arc<ActiveDescriptor>,
        creator: &dyn InstanceCreator,
    ) -> MultiResult<Instance> {
        let key = Self::key(descriptor);
        if let Some(entry) = self.instances.get(&key) {
            return Ok(entry.value().1.instance().clone());
        }
        // Only this thread writes this key, so creating without holding the
        // map entry cannot race.
        let created = Arc::new(creator.create(descriptor)?);
        let instance = created.instance().clone();
        let sequence = self.completed.fetch_add(1, Ordering::AcqRel);
        self.instances.insert(key, (sequence, created));
        Ok(instance)
    }

    fn contains(&self, descriptor: &ActiveDescriptor) -> bool {
        self.instances.contains_key(&Self::key(descriptor))
    }

    fn destroy_one(&self, descriptor: &ActiveDescriptor) {
        let id = descriptor.id();
        for created in self.take_where(|(_, entry)| *entry == id) {
            destroy_logged(PER_THREAD_SCOPE, &created);
        }
    }

    fn shutdown(&self) {
        for created in self.take_where(|_| true) {
            destroy_logged(PER_THREAD_SCOPE, &created);
        }
    }
}
