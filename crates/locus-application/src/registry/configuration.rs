//! Dynamic configuration
//!
//! A [`DynamicConfiguration`] accumulates binds, unbinds, filters and
//! extension registrations, then applies them with a single
//! [`DynamicConfiguration::commit`]. Nothing becomes visible to lookups
//! before the commit, and a rejected commit changes nothing.

use super::PendingChanges;
use super::active::{ActiveDescriptor, Recipe};
use crate::locator::ServiceLocator;
use crate::ports::{
    Context, ErrorService, Factory, InjectionResolver, RankedResolver, ValidationService,
};
use locus_domain::MultiResult;
use locus_domain::ports::Implementation;
use locus_domain::value_objects::{Descriptor, Filter, Instance};
use std::sync::Arc;

/// Transactional batch of registry changes
///
/// # Example
///
/// ```
/// use locus_application::ServiceLocator;
/// use locus_domain::value_objects::{Descriptor, Instance};
///
/// let locator = ServiceLocator::new("example");
/// let mut config = locator.create_dynamic_configuration();
/// config.bind_constant(
///     Descriptor::builder("app::Greeting").build(),
///     Instance::new(String::from("hello")),
/// );
/// config.commit().unwrap();
///
/// let greeting = locator.get_service("app::Greeting", &[]).unwrap().unwrap();
/// assert_eq!(*greeting.downcast::<String>().unwrap(), "hello");
/// ```
pub struct DynamicConfiguration {
    locator: ServiceLocator,
    changes: PendingChanges,
}

impl DynamicConfiguration {
    pub(crate) fn new(locator: ServiceLocator) -> Self {
        Self {
            locator,
            changes: PendingChanges::default(),
        }
    }

    fn push_bind(&mut self, descriptor: Descriptor, recipe: Recipe) -> Arc<ActiveDescriptor> {
        let id = self.locator.allocate_descriptor_id();
        let active = Arc::new(ActiveDescriptor::new(descriptor, id, recipe));
        self.changes.binds.push(Arc::clone(&active));
        active
    }

    /// Bind a descriptor whose implementation is registered on the locator
    /// under its implementation name and loaded on first reification
    ///
    /// The returned descriptor already carries its id.
    pub fn bind(&mut self, descriptor: Descriptor) -> Arc<ActiveDescriptor> {
        self.push_bind(descriptor, Recipe::Lazy)
    }

    /// Bind a descriptor with an explicit construction recipe
    pub fn bind_implementation(
        &mut self,
        descriptor: Descriptor,
        implementation: Arc<dyn Implementation>,
    ) -> Arc<ActiveDescriptor> {
        self.push_bind(descriptor, Recipe::Implementation(implementation))
    }

    /// Bind a descriptor whose instances come from a factory
    pub fn bind_factory(
        &mut self,
        descriptor: Descriptor,
        factory: Arc<dyn Factory>,
    ) -> Arc<ActiveDescriptor> {
        self.push_bind(descriptor, Recipe::Factory(factory))
    }

    /// Bind a pre-built instance
    pub fn bind_constant(&mut self, descriptor: Descriptor, instance: Instance) -> Arc<ActiveDescriptor> {
        self.push_bind(descriptor, Recipe::Constant(instance))
    }

    /// Remove every registered descriptor matching `filter`
    pub fn unbind<F: Filter + 'static>(&mut self, filter: F) {
        self.changes.unbinds.push(Box::new(filter));
    }

    /// Fail the commit if `filter` matches any registered descriptor
    pub fn add_idempotent_filter<F: Filter + 'static>(&mut self, filter: F) {
        self.changes.idempotent.push(Box::new(filter));
    }

    /// Fail the commit if an unbind in this batch would remove a descriptor
    /// matching `filter`
    pub fn add_unbind_filter<F: Filter + 'static>(&mut self, filter: F) {
        self.changes.unbind_guards.push(Box::new(filter));
    }

    /// Register the context for a new scope
    pub fn add_context(&mut self, context: Arc<dyn Context>) {
        self.changes.contexts.push(context);
    }

    /// Register a resolver; higher ranks are asked first
    pub fn add_injection_resolver(&mut self, resolver: Arc<dyn InjectionResolver>, rank: i32) {
        self.changes.resolvers.push(RankedResolver { rank, resolver });
    }

    pub fn add_error_service(&mut self, service: Arc<dyn ErrorService>) {
        self.changes.error_services.push(service);
    }

    pub fn add_validation_service(&mut self, service: Arc<dyn ValidationService>) {
        self.changes.validators.push(service);
    }

    /// Descriptors bound so far in this batch
    pub fn pending_binds(&self) -> &[Arc<ActiveDescriptor>] {
        &self.changes.binds
    }

    /// Apply the whole batch atomically
    ///
    /// On failure the returned aggregate lists every violation found and
    /// the registry is unchanged.
    pub fn commit(self) -> MultiResult<()> {
        self.locator.commit(self.changes)
    }
}

impl std::fmt::Debug for DynamicConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicConfiguration")
            .field("locator", &self.locator.name())
            .field("binds", &self.changes.binds.len())
            .field("unbinds", &self.changes.unbinds.len())
            .finish_non_exhaustive()
    }
}
