//! Descriptor registry
//!
//! The registry publishes an immutable [`RegistrySnapshot`] through an
//! `ArcSwap`. Readers load the current snapshot without locking; a commit
//! clones it, applies a whole [`DynamicConfiguration`] batch and swaps the
//! result in under a single commit lock, bumping the version counter.

pub mod active;
pub mod configuration;
pub mod index;

pub use active::{ActiveDescriptor, Recipe, Reification};
pub use configuration::DynamicConfiguration;
pub use index::{DescriptorIndex, OrderKey};

use crate::ports::{Context, ErrorService, Operation, RankedResolver, ValidationService};
use arc_swap::ArcSwap;
use locus_domain::value_objects::Filter;
use locus_domain::{Error, MultiError, MultiResult};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Everything a lookup needs, frozen at one registry version
#[derive(Clone, Default)]
pub struct RegistrySnapshot {
    /// Commit counter; 0 before the first commit
    pub version: u64,
    pub index: DescriptorIndex,
    /// Contexts by scope identifier
    pub contexts: HashMap<String, Arc<dyn Context>>,
    /// Custom resolvers, highest rank first
    pub resolvers: Vec<RankedResolver>,
    pub error_services: Vec<Arc<dyn ErrorService>>,
    pub validators: Vec<Arc<dyn ValidationService>>,
}

impl RegistrySnapshot {
    /// First validator rejecting `operation` on `descriptor`
    pub fn rejecting_validator(
        &self,
        operation: Operation,
        descriptor: &locus_domain::value_objects::Descriptor,
    ) -> Option<&Arc<dyn ValidationService>> {
        self.validators
            .iter()
            .find(|validator| !validator.validate(operation, descriptor))
    }
}

/// Changes accumulated by a dynamic configuration
#[derive(Default)]
pub(crate) struct PendingChanges {
    pub binds: Vec<Arc<ActiveDescriptor>>,
    pub unbinds: Vec<Box<dyn Filter>>,
    pub idempotent: Vec<Box<dyn Filter>>,
    pub unbind_guards: Vec<Box<dyn Filter>>,
    pub contexts: Vec<Arc<dyn Context>>,
    pub resolvers: Vec<RankedResolver>,
    pub error_services: Vec<Arc<dyn ErrorService>>,
    pub validators: Vec<Arc<dyn ValidationService>>,
}

/// Result of a successful commit
pub struct CommitOutcome {
    /// Version published by the commit
    pub version: u64,
    pub added: Vec<Arc<ActiveDescriptor>>,
    /// Descriptors removed, with the context that held their instances
    pub removed: Vec<(Arc<ActiveDescriptor>, Option<Arc<dyn Context>>)>,
}

/// Versioned, copy-on-write descriptor registry
pub struct Registry {
    current: ArcSwap<RegistrySnapshot>,
    commit_lock: Mutex<()>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::with_contexts(Vec::new())
    }

    /// Registry whose initial snapshot already serves `contexts`
    pub fn with_contexts(contexts: Vec<Arc<dyn Context>>) -> Self {
        let initial = RegistrySnapshot {
            contexts: contexts
                .into_iter()
                .map(|context| (context.scope().to_string(), context))
                .collect(),
            ..RegistrySnapshot::default()
        };
        Self {
            current: ArcSwap::from_pointee(initial),
            commit_lock: Mutex::new(()),
        }
    }

    /// Current snapshot; never blocks
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.current.load_full()
    }

    /// Current version
    pub fn version(&self) -> u64 {
        self.current.load().version
    }

    /// Validate and publish a batch, all or nothing
    ///
    /// `prevalidate` checks one new descriptor before anything is published;
    /// every violation of every rule is collected before the batch is
    /// rejected.
    pub(crate) fn commit<P>(
        &self,
        changes: PendingChanges,
        prevalidate: P,
    ) -> MultiResult<CommitOutcome>
    where
        P: Fn(&Arc<ActiveDescriptor>) -> MultiResult<()>,
    {
        let _guard = self.commit_lock.lock();
        let current = self.current.load_full();
        let mut errors = MultiError::new();

        for filter in &changes.idempotent {
            for existing in current.index.matching(filter.as_ref()) {
                errors.push(Error::DuplicateService {
                    descriptor: existing.to_string(),
                });
            }
        }

        let validators: Vec<&Arc<dyn ValidationService>> = current
            .validators
            .iter()
            .chain(changes.validators.iter())
            .collect();
        let rejected_by = |operation: Operation, descriptor: &ActiveDescriptor| {
            validators
                .iter()
                .find(|validator| !validator.validate(operation, descriptor.descriptor()))
                .map(|validator| Error::ValidationFailure {
                    operation: operation.to_string(),
                    descriptor: descriptor.to_string(),
                    validator: validator.name().to_string(),
                })
        };

        let mut removals: BTreeMap<OrderKey, Arc<ActiveDescriptor>> = BTreeMap::new();
        for filter in &changes.unbinds {
            for existing in current.index.matching(filter.as_ref()) {
                if changes
                    .unbind_guards
                    .iter()
                    .any(|guard| guard.matches(existing.descriptor()))
                {
                    errors.push(Error::UnbindForbidden {
                        descriptor: existing.to_string(),
                    });
                } else if let Some(rejection) = rejected_by(Operation::Unbind, &existing) {
                    errors.push(rejection);
                } else {
                    removals.insert(OrderKey::of(&existing), existing);
                }
            }
        }

        for bound in &changes.binds {
            if let Some(rejection) = rejected_by(Operation::Bind, bound) {
                errors.push(rejection);
            }
            if let Err(e) = prevalidate(bound) {
                errors.absorb(e);
            }
        }

        let mut scopes: HashSet<&str> = HashSet::new();
        for context in &changes.contexts {
            let scope = context.scope();
            if current.contexts.contains_key(scope) || !scopes.insert(scope) {
                errors.push(Error::illegal_state(format!(
                    "a context for scope {scope} is already registered"
                )));
            }
        }

        if !errors.is_empty() {
            debug!(violations = errors.len(), "Dynamic configuration rejected");
            return Err(errors);
        }

        let mut next = (*current).clone();
        next.version = current.version + 1;
        let mut removed = Vec::with_capacity(removals.len());
        for descriptor in removals.into_values() {
            next.index.remove(&descriptor);
            let context = next.contexts.get(descriptor.scope()).cloned();
            removed.push((descriptor, context));
        }
        for descriptor in &changes.binds {
            next.index.insert(Arc::clone(descriptor));
        }
        for context in changes.contexts {
            next.contexts.insert(context.scope().to_string(), context);
        }
        next.resolvers.extend(changes.resolvers);
        next.resolvers.sort_by(|a, b| b.rank.cmp(&a.rank));
        next.error_services.extend(changes.error_services);
        next.validators.extend(changes.validators);

        let version = next.version;
        self.current.store(Arc::new(next));
        debug!(
            version,
            added = changes.binds.len(),
            removed = removed.len(),
            "Dynamic configuration committed"
        );
        Ok(CommitOutcome {
            version,
            added: changes.binds,
            removed,
        })
    }
}
