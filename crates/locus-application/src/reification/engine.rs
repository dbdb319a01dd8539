//! Reification engine
//!
//! Reification turns a bound descriptor into something that can be built:
//! the implementation is loaded, its model validated and its injectees
//! derived. The outcome, success or failure, is memoized on the
//! descriptor. The engine also owns the injectee resolution cache that
//! maps a structural injectee key to the descriptor that satisfied it.

use super::analysis::analyze;
use crate::registry::{ActiveDescriptor, Recipe, Reification};
use dashmap::DashMap;
use locus_domain::ports::Implementation;
use locus_domain::value_objects::{InjecteeKey, ParentRef};
use locus_domain::{Error, MultiResult};
use std::sync::Arc;
use tracing::trace;

/// Best-descriptor answer recorded at a registry version
type CachedResolution = (u64, Option<Arc<ActiveDescriptor>>);

/// Reifies descriptors and caches injectee resolutions
#[derive(Default)]
pub struct ReificationEngine {
    resolutions: DashMap<InjecteeKey, CachedResolution>,
}

impl ReificationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reify `descriptor`, loading lazy implementations through `load`
    pub fn reify<'d, L>(
        &self,
        descriptor: &'d ActiveDescriptor,
        load: L,
    ) -> MultiResult<&'d Reification>
    where
        L: FnOnce(&str) -> Option<Arc<dyn Implementation>>,
    {
        descriptor.reify_with(|| {
            let implementation = match descriptor.recipe() {
                Recipe::Constant(_) | Recipe::Factory(_) => {
                    return Ok(Reification {
                        injectees: Arc::from([]),
                        implementation: None,
                    });
                }
                Recipe::Implementation(implementation) => Arc::clone(implementation),
                Recipe::Lazy => load(descriptor.implementation()).ok_or_else(|| {
                    Error::reification(
                        descriptor.implementation(),
                        "no implementation is registered under this name",
                    )
                })?,
            };
            let parent = ParentRef {
                id: Some(descriptor.id()),
                implementation: descriptor.implementation().to_string(),
            };
            let injectees = analyze(&implementation.model(), &parent)?;
            trace!(
                descriptor = %descriptor,
                injectees = injectees.len(),
                "Descriptor reified"
            );
            Ok(Reification {
                injectees: injectees.into(),
                implementation: Some(implementation),
            })
        })
    }

    /// Best descriptor for an injectee key at registry `version`
    ///
    /// Entries recorded at an older version are recomputed; the cache holds
    /// at most one entry per structural key.
    pub fn resolve_cached<F>(
        &self,
        key: &InjecteeKey,
        version: u64,
        compute: F,
    ) -> Option<Arc<ActiveDescriptor>>
    where
        F: FnOnce() -> Option<Arc<ActiveDescriptor>>,
    {
        if let Some(entry) = self.resolutions.get(key) {
            let (cached_version, best) = entry.value();
            if *cached_version == version {
                return best.clone();
            }
        }
        let best = compute();
        self.resolutions
            .insert(key.clone(), (version, best.clone()));
        best
    }

    /// Forget every cached resolution
    pub fn clear_resolutions(&self) {
        self.resolutions.clear();
    }

    /// Number of cached resolutions
    pub fn resolution_cache_len(&self) -> usize {
        self.resolutions.len()
    }
}
