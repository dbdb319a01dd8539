//! Injection Resolver Port
//!
//! Resolvers turn an [`Injectee`] into a value. Resolvers are registered
//! with a rank through a dynamic configuration; for each injectee the
//! locator asks them in descending rank order and the first one that
//! answers wins. The built-in resolver answers at rank 0.

use crate::locator::{ServiceHandle, ServiceLocator};
use crate::registry::ActiveDescriptor;
use locus_domain::MultiResult;
use locus_domain::value_objects::{Injectee, ResolvedValue};
use std::cell::RefCell;
use std::sync::Arc;

/// Rank of the built-in resolver
pub const DEFAULT_RESOLVER_RANK: i32 = 0;

/// Strategy that supplies values for injection points
pub trait InjectionResolver: Send + Sync {
    /// Human-readable name used in logs
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Value for `injectee`, or `None` to let lower-ranked resolvers answer
    fn resolve(
        &self,
        injectee: &Injectee,
        request: &ResolutionRequest<'_>,
    ) -> MultiResult<Option<ResolvedValue>>;
}

/// State of one resolution pass over the injectees of a descriptor
pub struct ResolutionRequest<'a> {
    locator: &'a ServiceLocator,
    parent: &'a Arc<ActiveDescriptor>,
    nested: &'a RefCell<Vec<ServiceHandle>>,
}

impl<'a> ResolutionRequest<'a> {
    pub(crate) fn new(
        locator: &'a ServiceLocator,
        parent: &'a Arc<ActiveDescriptor>,
        nested: &'a RefCell<Vec<ServiceHandle>>,
    ) -> Self {
        Self {
            locator,
            parent,
            nested,
        }
    }

    /// Locator performing the resolution
    pub fn locator(&self) -> &ServiceLocator {
        self.locator
    }

    /// Descriptor whose injectees are being resolved
    pub fn parent(&self) -> &Arc<ActiveDescriptor> {
        self.parent
    }

    /// Tie the lifetime of a per-lookup instance to the instance being built
    pub fn record_nested(&self, handle: ServiceHandle) {
        self.nested.borrow_mut().push(handle);
    }
}

/// A resolver registered with its rank
#[derive(Clone)]
pub struct RankedResolver {
    pub rank: i32,
    pub resolver: Arc<dyn InjectionResolver>,
}

impl std::fmt::Debug for RankedResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RankedResolver")
            .field("rank", &self.rank)
            .field("resolver", &self.resolver.name())
            .finish()
    }
}
