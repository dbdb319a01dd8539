//! Per-lookup context
//!
//! Every lookup builds a fresh instance. Nothing is retained here; the
//! handle or parent instance that requested the instance owns its
//! destruction.

use crate::ports::{Context, InstanceCreator};
use crate::registry::ActiveDescriptor;
use locus_domain::MultiResult;
use locus_domain::constants::PER_LOOKUP_SCOPE;
use locus_domain::value_objects::Instance;
use std::sync::Arc;

/// Context of the `PerLookup` scope
#[derive(Debug, Default, Clone, Copy)]
pub struct PerLookupContext;

impl Context for PerLookupContext {
    fn scope(&self) -> &str {
        PER_LOOKUP_SCOPE
    }

    fn find_or_create(
        &self,
        descriptor: &Arc<ActiveDescriptor>,
        creator: &dyn InstanceCreator,
    ) -> MultiResult<Instance> {
        creator
            .create(descriptor)
            .map(|created| created.instance().clone())
    }

    fn contains(&self, _descriptor: &ActiveDescriptor) -> bool {
        false
    }

    fn retains_instances(&self) -> bool {
        false
    }

    fn destroy_one(&self, _descriptor: &ActiveDescriptor) {}

    fn shutdown(&self) {}
}
