//! Service locator
//!
//! The [`ServiceLocator`] is the registry facade applications talk to:
//! lookups by contract, name, qualifiers or filter, explicit reification,
//! dynamic configuration and shutdown. Locators can be chained; a child
//! sees its parent's descriptors merged into its own lookups, and a
//! descriptor is always instantiated by the locator that bound it.

use super::creator::LocatorCreator;
use super::deferred::Deferred;
use super::handle::ServiceHandle;
use crate::contexts::{PerLookupContext, PerThreadContext, SingletonContext};
use crate::ports::{
    ConfigurationListener, Context, ErrorInformation, ErrorType, Operation, ResolutionRequest,
};
use crate::reification::ReificationEngine;
use crate::registry::{
    ActiveDescriptor, DynamicConfiguration, OrderKey, PendingChanges, Recipe, Registry,
    RegistrySnapshot, Reification,
};
use dashmap::DashMap;
use locus_domain::constants::{PER_LOOKUP_SCOPE, PER_THREAD_SCOPE, SINGLETON_SCOPE};
use locus_domain::ports::Implementation;
use locus_domain::value_objects::{
    Descriptor, DescriptorId, Filter, Injectee, Instance, contract_of, filter,
};
use locus_domain::{Error, MultiError, MultiResult};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info};

static NEXT_LOCATOR_ID: AtomicU64 = AtomicU64::new(0);

pub(crate) struct LocatorInner {
    id: u64,
    name: String,
    parent: Option<ServiceLocator>,
    children: Mutex<Vec<Weak<LocatorInner>>>,
    registry: Registry,
    engine: ReificationEngine,
    implementations: DashMap<String, Arc<dyn Implementation>>,
    listeners: RwLock<Vec<Arc<dyn ConfigurationListener>>>,
    next_service_id: AtomicU64,
    shut_down: AtomicBool,
}

/// Handle to a service locator; clones share the same locator
#[derive(Clone)]
pub struct ServiceLocator {
    inner: Arc<LocatorInner>,
}

impl ServiceLocator {
    /// Root locator with the built-in contexts registered
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self::build(name.into(), None)
    }

    /// Child locator whose lookups also see `parent`'s descriptors
    pub fn with_parent<S: Into<String>>(name: S, parent: &ServiceLocator) -> Self {
        let child = Self::build(name.into(), Some(parent.clone()));
        parent
            .inner
            .children
            .lock()
            .push(Arc::downgrade(&child.inner));
        child
    }

    fn build(name: String, parent: Option<ServiceLocator>) -> Self {
        let contexts: Vec<Arc<dyn Context>> = vec![
            Arc::new(SingletonContext::new()),
            Arc::new(PerLookupContext),
            Arc::new(PerThreadContext::new()),
        ];
        let id = NEXT_LOCATOR_ID.fetch_add(1, Ordering::Relaxed);
        debug!(locator = %name, id, "Service locator created");
        Self {
            inner: Arc::new(LocatorInner {
                id,
                name,
                parent,
                children: Mutex::new(Vec::new()),
                registry: Registry::with_contexts(contexts),
                engine: ReificationEngine::new(),
                implementations: DashMap::new(),
                listeners: RwLock::new(Vec::new()),
                next_service_id: AtomicU64::new(0),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// Process-unique locator id
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn parent(&self) -> Option<&ServiceLocator> {
        self.inner.parent.as_ref()
    }

    /// Registry version; bumped by every successful commit
    pub fn version(&self) -> u64 {
        self.inner.registry.version()
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }

    fn ensure_running(&self) -> Result<(), Error> {
        if self.is_shut_down() {
            return Err(Error::Shutdown {
                locator: self.inner.name.clone(),
            });
        }
        Ok(())
    }

    pub(crate) fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.inner.registry.snapshot()
    }

    /// Sum of the registry versions along the parent chain
    ///
    /// Every version only grows, so the sum changes whenever any registry
    /// visible to this locator commits.
    fn lineage_version(&self) -> u64 {
        let parent = self.parent().map_or(0, ServiceLocator::lineage_version);
        self.version() + parent
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Start a transactional batch of changes
    pub fn create_dynamic_configuration(&self) -> DynamicConfiguration {
        DynamicConfiguration::new(self.clone())
    }

    /// Make an implementation loadable by descriptors bound with
    /// [`DynamicConfiguration::bind`], under its model name
    pub fn register_implementation(&self, implementation: Arc<dyn Implementation>) {
        let name = implementation.model().name;
        self.register_implementation_as(name, implementation);
    }

    /// Make an implementation loadable under an explicit name
    pub fn register_implementation_as<S: Into<String>>(
        &self,
        name: S,
        implementation: Arc<dyn Implementation>,
    ) {
        self.inner.implementations.insert(name.into(), implementation);
    }

    fn load_implementation(&self, name: &str) -> Option<Arc<dyn Implementation>> {
        if let Some(found) = self.inner.implementations.get(name) {
            return Some(Arc::clone(found.value()));
        }
        self.parent()
            .and_then(|parent| parent.load_implementation(name))
    }

    /// Be told about every successful commit
    pub fn add_configuration_listener(&self, listener: Arc<dyn ConfigurationListener>) {
        self.inner.listeners.write().push(listener);
    }

    pub(crate) fn allocate_descriptor_id(&self) -> DescriptorId {
        DescriptorId {
            locator_id: self.inner.id,
            service_id: self.inner.next_service_id.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub(crate) fn commit(&self, changes: PendingChanges) -> MultiResult<()> {
        self.ensure_running()?;
        let outcome = self
            .inner
            .registry
            .commit(changes, |descriptor| self.prevalidate(descriptor))?;
        self.inner.engine.clear_resolutions();
        for (descriptor, context) in &outcome.removed {
            if let Some(context) = context {
                context.destroy_one(descriptor);
            }
        }
        let listeners = self.inner.listeners.read().clone();
        for listener in listeners {
            listener.configuration_changed(outcome.version);
        }
        Ok(())
    }

    /// Reify what can be reified before the descriptor becomes visible
    ///
    /// Lazy descriptors whose implementation is not registered yet are left
    /// for the first lookup.
    fn prevalidate(&self, descriptor: &Arc<ActiveDescriptor>) -> MultiResult<()> {
        match descriptor.recipe() {
            Recipe::Implementation(_) => self.reify_active(descriptor).map(|_| ()),
            Recipe::Lazy => match self.load_implementation(descriptor.implementation()) {
                Some(_) => self.reify_active(descriptor).map(|_| ()),
                None => Ok(()),
            },
            Recipe::Factory(_) | Recipe::Constant(_) => Ok(()),
        }
    }

    // ========================================================================
    // Descriptor queries
    // ========================================================================

    /// Every visible descriptor matching `filter`, in lookup order
    pub fn get_descriptors(&self, filter: &dyn Filter) -> MultiResult<Vec<Arc<ActiveDescriptor>>> {
        self.ensure_running()?;
        let snapshot = self.snapshot();
        let mut found: Vec<Arc<ActiveDescriptor>> = snapshot
            .index
            .matching(filter)
            .into_iter()
            .filter(|descriptor| Self::visible(&snapshot, descriptor))
            .collect();
        if let Some(parent) = self.parent() {
            found.extend(parent.get_descriptors(filter)?);
            found.sort_by_key(|descriptor| OrderKey::of(descriptor));
        }
        Ok(found)
    }

    /// Highest-ranked visible descriptor matching `filter`
    pub fn get_best_descriptor(
        &self,
        filter: &dyn Filter,
    ) -> MultiResult<Option<Arc<ActiveDescriptor>>> {
        self.ensure_running()?;
        let snapshot = self.snapshot();
        let local = if snapshot.validators.is_empty() {
            snapshot.index.best(filter)
        } else {
            snapshot
                .index
                .matching(filter)
                .into_iter()
                .find(|descriptor| Self::visible(&snapshot, descriptor))
        };
        let inherited = match self.parent() {
            Some(parent) => parent.get_best_descriptor(filter)?,
            None => None,
        };
        Ok(match (local, inherited) {
            (Some(local), Some(inherited)) => {
                if OrderKey::of(&inherited) < OrderKey::of(&local) {
                    Some(inherited)
                } else {
                    Some(local)
                }
            }
            (local, inherited) => local.or(inherited),
        })
    }

    fn visible(snapshot: &RegistrySnapshot, descriptor: &ActiveDescriptor) -> bool {
        snapshot
            .rejecting_validator(Operation::Lookup, descriptor.descriptor())
            .is_none()
    }

    /// Force reification of a descriptor without instantiating it
    ///
    /// Descriptors bound to this locator (or an ancestor) are reified in
    /// place; any other descriptor is analyzed as a detached, never-bound
    /// copy.
    pub fn reify_descriptor(&self, descriptor: &Descriptor) -> MultiResult<Arc<ActiveDescriptor>> {
        self.ensure_running()?;
        let bound = match descriptor.id() {
            Some(id) => self.get_best_descriptor(&filter::by_id(id))?,
            None => None,
        };
        let active = bound.unwrap_or_else(|| {
            Arc::new(ActiveDescriptor::new(
                descriptor.clone(),
                self.allocate_descriptor_id(),
                Recipe::Lazy,
            ))
        });
        self.reify_active(&active)?;
        Ok(active)
    }

    /// Reify an active descriptor, returning its injectees
    pub fn reify_active(&self, descriptor: &ActiveDescriptor) -> MultiResult<Vec<Injectee>> {
        self.reification(descriptor)
            .map(|reification| reification.injectees.to_vec())
    }

    pub(crate) fn reification<'d>(
        &self,
        descriptor: &'d ActiveDescriptor,
    ) -> MultiResult<&'d Reification> {
        self.inner
            .engine
            .reify(descriptor, |name| self.load_implementation(name))
    }

    /// Number of structural injectee keys with a cached resolution
    pub fn resolution_cache_len(&self) -> usize {
        self.inner.engine.resolution_cache_len()
    }

    // ========================================================================
    // Service lookups
    // ========================================================================

    fn contract_filter(contract: &str, qualifiers: &[&str]) -> filter::ContractFilter {
        filter::contract(contract).qualified_by_all(qualifiers.iter().copied())
    }

    /// Best service advertising `contract` with every qualifier
    ///
    /// Descriptors of proxiable scopes yield a [`Deferred`] instance.
    pub fn get_service(&self, contract: &str, qualifiers: &[&str]) -> MultiResult<Option<Instance>> {
        match self.get_best_descriptor(&Self::contract_filter(contract, qualifiers))? {
            Some(descriptor) => self.instance_for(&descriptor, None).map(Some),
            None => Ok(None),
        }
    }

    /// Best service advertising `contract` and carrying `name`
    pub fn get_named_service(&self, contract: &str, name: &str) -> MultiResult<Option<Instance>> {
        match self.get_best_descriptor(&filter::contract(contract).named(name))? {
            Some(descriptor) => self.instance_for(&descriptor, None).map(Some),
            None => Ok(None),
        }
    }

    /// Best service for the contract of `T`, downcast
    ///
    /// Deferred instances are resolved transparently.
    pub fn get<T: Any + Send + Sync>(&self) -> MultiResult<Option<Arc<T>>> {
        match self.get_service(&contract_of::<T>(), &[])? {
            Some(instance) => Deferred::resolve::<T>(&instance).map(Some),
            None => Ok(None),
        }
    }

    /// Handle to the best service advertising `contract`
    pub fn get_service_handle(
        &self,
        contract: &str,
        qualifiers: &[&str],
    ) -> MultiResult<Option<ServiceHandle>> {
        Ok(self
            .get_best_descriptor(&Self::contract_filter(contract, qualifiers))?
            .map(|descriptor| self.handle_for(descriptor)))
    }

    /// Every service advertising `contract`, best first
    pub fn get_all_services(&self, contract: &str, qualifiers: &[&str]) -> MultiResult<Vec<Instance>> {
        let descriptors = self.get_descriptors(&Self::contract_filter(contract, qualifiers))?;
        self.instances_for(&descriptors, None)
    }

    /// Handles to every service matching `filter`, best first
    pub fn get_all_service_handles(&self, filter: &dyn Filter) -> MultiResult<Vec<ServiceHandle>> {
        Ok(self
            .get_descriptors(filter)?
            .into_iter()
            .map(|descriptor| self.handle_for(descriptor))
            .collect())
    }

    /// Lazily-populated handle for a descriptor
    pub fn handle_for(&self, descriptor: Arc<ActiveDescriptor>) -> ServiceHandle {
        ServiceHandle::new(self.clone(), descriptor)
    }

    /// Direct instance of a descriptor, never a deferred one
    ///
    /// Fails with a no-active-context error when the descriptor's scope is
    /// not active on this thread.
    pub fn get_service_for(&self, descriptor: &Arc<ActiveDescriptor>) -> MultiResult<Instance> {
        self.ensure_running()?;
        let owner = self.owner_of(descriptor)?;
        let context = owner.context_for(descriptor.scope())?;
        owner.create_in(&context, descriptor)
    }

    /// Context registered for `scope`, looked up along the parent chain
    pub fn context_for(&self, scope: &str) -> MultiResult<Arc<dyn Context>> {
        if let Some(context) = self.snapshot().contexts.get(scope) {
            return Ok(Arc::clone(context));
        }
        match self.parent() {
            Some(parent) => parent.context_for(scope),
            None => Err(Error::no_active_context(
                scope,
                format!("no context is registered in locator {}", self.name()),
            )
            .into()),
        }
    }

    /// The locator in this chain that bound `descriptor`
    pub(crate) fn owner_of(&self, descriptor: &ActiveDescriptor) -> Result<ServiceLocator, Error> {
        let wanted = descriptor.id().locator_id;
        let mut current = Some(self);
        while let Some(locator) = current {
            if locator.id() == wanted {
                return Ok(locator.clone());
            }
            current = locator.parent();
        }
        Err(Error::not_found(format!(
            "locator {wanted} owning {descriptor} is not visible from {}",
            self.name()
        )))
    }

    pub(crate) fn create_in(
        &self,
        context: &Arc<dyn Context>,
        descriptor: &Arc<ActiveDescriptor>,
    ) -> MultiResult<Instance> {
        context.find_or_create(descriptor, &LocatorCreator::new(self))
    }

    /// Instance handed to a lookup or injection point
    ///
    /// Proxiable descriptors yield a [`Deferred`]; per-lookup instances made
    /// during a resolution are recorded on it so they are destroyed with
    /// the instance being built.
    pub(crate) fn instance_for(
        &self,
        descriptor: &Arc<ActiveDescriptor>,
        request: Option<&ResolutionRequest<'_>>,
    ) -> MultiResult<Instance> {
        self.ensure_running()?;
        let owner = self.owner_of(descriptor)?;
        let context = owner.context_for(descriptor.scope())?;
        if descriptor
            .proxiable()
            .unwrap_or_else(|| context.proxiable())
        {
            return Ok(Instance::new(Deferred::for_descriptor(
                owner,
                Arc::clone(descriptor),
            )));
        }
        if context.retains_instances() {
            return owner.create_in(&context, descriptor);
        }
        let handle = owner.handle_for(Arc::clone(descriptor));
        let instance = handle.service()?;
        if let Some(request) = request {
            request.record_nested(handle);
        }
        Ok(instance)
    }

    pub(crate) fn instances_for(
        &self,
        descriptors: &[Arc<ActiveDescriptor>],
        request: Option<&ResolutionRequest<'_>>,
    ) -> MultiResult<Vec<Instance>> {
        let mut errors = MultiError::new();
        let mut instances = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            match self.instance_for(descriptor, request) {
                Ok(instance) => instances.push(instance),
                Err(e) => errors.absorb(e),
            }
        }
        errors.into_result(instances)
    }

    /// Best descriptor for an injectee, through the resolution cache
    pub(crate) fn best_for_injectee(
        &self,
        injectee: &Injectee,
    ) -> MultiResult<Option<Arc<ActiveDescriptor>>> {
        self.ensure_running()?;
        let filter = filter::contract(injectee.required_type())
            .qualified_by_all(injectee.qualifiers().iter().cloned());
        let mut lookup_error = None;
        let best = self
            .inner
            .engine
            .resolve_cached(&injectee.key(), self.lineage_version(), || {
                match self.get_best_descriptor(&filter) {
                    Ok(best) => best,
                    Err(e) => {
                        lookup_error = Some(e);
                        None
                    }
                }
            });
        match lookup_error {
            Some(e) => Err(e),
            None => Ok(best),
        }
    }

    // ========================================================================
    // Error reporting
    // ========================================================================

    pub(crate) fn report_failure(
        &self,
        error_type: ErrorType,
        descriptor: Option<&Descriptor>,
        injectee: Option<&Injectee>,
        error: &MultiError,
    ) {
        debug!(
            locator = %self.inner.name,
            ?error_type,
            descriptor = descriptor.map(ToString::to_string),
            error = %error,
            "Service failure"
        );
        let snapshot = self.snapshot();
        if snapshot.error_services.is_empty() {
            return;
        }
        let information = ErrorInformation {
            error_type,
            descriptor: descriptor.cloned(),
            injectee: injectee.cloned(),
            error: error.clone(),
        };
        for service in &snapshot.error_services {
            service.on_failure(&information);
        }
    }

    // ========================================================================
    // Shutdown
    // ========================================================================

    /// Destroy children, then every context's instances; later operations
    /// fail with a shutdown error
    pub fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let children: Vec<Weak<LocatorInner>> = self.inner.children.lock().drain(..).collect();
        for child in children.iter().filter_map(Weak::upgrade) {
            ServiceLocator { inner: child }.shutdown();
        }
        let snapshot = self.snapshot();
        let builtin = [PER_THREAD_SCOPE, PER_LOOKUP_SCOPE, SINGLETON_SCOPE];
        for (scope, context) in &snapshot.contexts {
            if !builtin.contains(&scope.as_str()) {
                context.shutdown();
            }
        }
        for scope in builtin {
            if let Some(context) = snapshot.contexts.get(scope) {
                context.shutdown();
            }
        }
        self.inner.engine.clear_resolutions();
        info!(locator = %self.inner.name, "Service locator shut down");
    }
}

impl fmt::Debug for ServiceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceLocator")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("version", &self.version())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
