//! Singleton context
//!
//! One instance per descriptor for the lifetime of the locator.

use super::cache::InstanceCache;
use crate::ports::{Context, InstanceCreator};
use crate::registry::ActiveDescriptor;
use locus_domain::MultiResult;
use locus_domain::constants::SINGLETON_SCOPE;
use locus_domain::value_objects::Instance;
use std::sync::Arc;
use tracing::debug;

/// Context of the `Singleton` scope
#[derive(Default)]
pub struct SingletonContext {
    cache: InstanceCache,
}

impl SingletonContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live singletons
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl Context for SingletonContext {
    fn scope(&self) -> &str {
        SINGLETON_SCOPE
    }

    fn find_or_create(
        &self,
        descriptor: &Arc<ActiveDescriptor>,
        creator: &dyn InstanceCreator,
    ) -> MultiResult<Instance> {
        self.cache.find_or_create(descriptor, creator, None)
    }

    fn contains(&self, descriptor: &ActiveDescriptor) -> bool {
        self.cache.contains(descriptor)
    }

    fn destroy_one(&self, descriptor: &ActiveDescriptor) {
        if let Some(created) = self.cache.take(descriptor) {
            super::cache::destroy_logged(SINGLETON_SCOPE, &created);
        }
    }

    fn shutdown(&self) {
        debug!(live = self.cache.len(), "Shutting down singleton context");
        self.cache.destroy_all(SINGLETON_SCOPE);
    }
}
