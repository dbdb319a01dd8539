//! Deferred service handles
//!
//! A [`Deferred`] stands in for a service that should not, or cannot, be
//! built at injection time. Proxiable scopes hand one out for every lookup
//! so the real instance is taken from whichever scope instance is active
//! when [`Deferred::get`] is called.

use super::service_locator::ServiceLocator;
use crate::registry::ActiveDescriptor;
use locus_domain::value_objects::{Instance, filter};
use locus_domain::{Error, MultiResult};
use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

enum Target {
    Descriptor(Arc<ActiveDescriptor>),
    Lookup {
        contract: String,
        qualifiers: Vec<String>,
    },
}

/// Lazily resolved service
pub struct Deferred {
    locator: ServiceLocator,
    target: Target,
}

impl Deferred {
    pub(crate) fn for_descriptor(locator: ServiceLocator, descriptor: Arc<ActiveDescriptor>) -> Self {
        Self {
            locator,
            target: Target::Descriptor(descriptor),
        }
    }

    pub(crate) fn for_lookup(locator: ServiceLocator, contract: &str, qualifiers: Vec<String>) -> Self {
        Self {
            locator,
            target: Target::Lookup {
                contract: contract.to_string(),
                qualifiers,
            },
        }
    }

    /// Descriptor this handle is pinned to, if any
    pub fn descriptor(&self) -> Option<&Arc<ActiveDescriptor>> {
        match &self.target {
            Target::Descriptor(descriptor) => Some(descriptor),
            Target::Lookup { .. } => None,
        }
    }

    /// Resolve the underlying instance now
    pub fn get(&self) -> MultiResult<Instance> {
        match &self.target {
            Target::Descriptor(descriptor) => self.locator.get_service_for(descriptor),
            Target::Lookup {
                contract,
                qualifiers,
            } => {
                let wanted = filter::contract(contract.as_str()).qualified_by_all(qualifiers.iter().cloned());
                let best = self
                    .locator
                    .get_best_descriptor(&wanted)?
                    .ok_or_else(|| Error::not_found(format!("service advertising {contract}")))?;
                self.locator.get_service_for(&best)
            }
        }
    }

    /// Resolve and downcast the underlying instance
    pub fn get_as<T: Any + Send + Sync>(&self) -> MultiResult<Arc<T>> {
        let instance = self.get()?;
        instance
            .downcast::<T>()
            .ok_or_else(|| mismatch::<T>(&instance).into())
    }

    /// Whether [`Deferred::get`] can currently succeed without a scope error
    pub fn is_available(&self) -> bool {
        match &self.target {
            Target::Descriptor(descriptor) => self
                .locator
                .context_for(descriptor.scope())
                .is_ok_and(|context| context.is_active()),
            Target::Lookup { .. } => !self.locator.is_shut_down(),
        }
    }

    /// Downcast an instance that may be a deferred handle
    ///
    /// A [`Deferred`] is resolved first; anything else is downcast directly.
    pub fn resolve<T: Any + Send + Sync>(instance: &Instance) -> MultiResult<Arc<T>> {
        if let Some(direct) = instance.downcast::<T>() {
            return Ok(direct);
        }
        match instance.downcast::<Deferred>() {
            Some(deferred) => deferred.get_as::<T>(),
            None => Err(mismatch::<T>(instance).into()),
        }
    }
}

fn mismatch<T>(instance: &Instance) -> Error {
    Error::invalid_argument(format!("{instance:?} is not a {}", type_name::<T>()))
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Target::Descriptor(descriptor) => write!(f, "Deferred({descriptor})"),
            Target::Lookup { contract, .. } => write!(f, "Deferred(lookup {contract})"),
        }
    }
}
