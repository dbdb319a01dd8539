//! Scope Context Port
//!
//! A [`Context`] owns the lifetime of instances for one scope. The locator
//! asks the context for an instance and hands it an [`InstanceCreator`] that
//! builds one when the context has nothing cached. Whatever the context
//! keeps is stored as a [`CreatedInstance`] so it can later run the
//! destruction hooks and cascade to nested per-lookup instances.

use crate::locator::ServiceHandle;
use crate::ports::factory::Factory;
use crate::registry::ActiveDescriptor;
use locus_domain::ports::Implementation;
use locus_domain::value_objects::Instance;
use locus_domain::{Error, MultiError, MultiResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

// ============================================================================
// Context Interface
// ============================================================================

/// Lifetime manager for one scope
pub trait Context: Send + Sync {
    /// Scope identifier handled by this context
    fn scope(&self) -> &str;

    /// Cached instance of `descriptor`, built through `creator` when absent
    ///
    /// Concurrent first requests for the same descriptor must produce a
    /// single construction; every waiter observes that construction's outcome.
    fn find_or_create(
        &self,
        descriptor: &Arc<ActiveDescriptor>,
        creator: &dyn InstanceCreator,
    ) -> MultiResult<Instance>;

    /// Whether an instance of `descriptor` currently lives in this context
    fn contains(&self, descriptor: &ActiveDescriptor) -> bool;

    /// Whether the scope can serve lookups right now
    fn is_active(&self) -> bool {
        true
    }

    /// Whether lookups should receive deferred handles by default
    fn proxiable(&self) -> bool {
        false
    }

    /// Whether the context retains what it creates
    ///
    /// Non-retaining contexts leave destruction to the handle that requested
    /// the instance.
    fn retains_instances(&self) -> bool {
        true
    }

    /// Destroy the instance of one descriptor, if any
    fn destroy_one(&self, descriptor: &ActiveDescriptor);

    /// Destroy everything, newest first
    fn shutdown(&self);
}

/// Builds a fresh instance for a context
pub trait InstanceCreator {
    /// Construct, inject and initialize an instance of `descriptor`
    fn create(&self, descriptor: &Arc<ActiveDescriptor>) -> MultiResult<CreatedInstance>;
}

// ============================================================================
// Created Instance
// ============================================================================

/// How a created instance is torn down
#[derive(Clone)]
pub enum Disposal {
    /// Constants are not owned by the locator
    Nothing,
    /// Run the implementation's destroy hook
    Implementation(Arc<dyn Implementation>),
    /// Hand the instance back to its factory
    Factory(Arc<dyn Factory>),
}

/// An instance together with everything needed to destroy it
pub struct CreatedInstance {
    instance: Instance,
    descriptor: Arc<ActiveDescriptor>,
    disposal: Disposal,
    nested: Vec<ServiceHandle>,
    destroyed: AtomicBool,
}

impl CreatedInstance {
    /// Wrap a freshly built instance
    pub fn new(
        instance: Instance,
        descriptor: Arc<ActiveDescriptor>,
        disposal: Disposal,
        nested: Vec<ServiceHandle>,
    ) -> Self {
        Self {
            instance,
            descriptor,
            disposal,
            nested,
            destroyed: AtomicBool::new(false),
        }
    }

    /// The instance
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Descriptor the instance was built from
    pub fn descriptor(&self) -> &Arc<ActiveDescriptor> {
        &self.descriptor
    }

    /// Handles of per-lookup instances created while building this one
    pub fn nested(&self) -> &[ServiceHandle] {
        &self.nested
    }

    /// Whether [`CreatedInstance::destroy`] already ran
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Run the destroy hook, then destroy nested instances newest first
    ///
    /// Only the first call has any effect.
    pub fn destroy(&self) -> MultiResult<()> {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut errors = MultiError::new();
        let hook = match &self.disposal {
            Disposal::Nothing => Ok(()),
            Disposal::Implementation(implementation) => implementation.pre_destroy(&self.instance),
            Disposal::Factory(factory) => factory.dispose(&self.instance),
        };
        if let Err(e) = hook {
            errors.push(Error::creation(
                self.descriptor.to_string(),
                format!("destruction failed: {e}"),
            ));
        }
        for handle in self.nested.iter().rev() {
            if let Err(e) = handle.destroy() {
                errors.absorb(e);
            }
        }
        errors.into_result(())
    }
}

impl std::fmt::Debug for CreatedInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreatedInstance")
            .field("descriptor", &self.descriptor.to_string())
            .field("nested", &self.nested.len())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
