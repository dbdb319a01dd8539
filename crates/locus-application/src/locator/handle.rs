//! Service handles
//!
//! A [`ServiceHandle`] ties a descriptor to the instance obtained through
//! it. Handles for per-lookup descriptors own their instance: destroying
//! the handle runs the destroy hook and then destroys, newest first, every
//! per-lookup instance created while building it. Handles for retaining
//! scopes destroy the scope's instance.

use super::creator::LocatorCreator;
use super::deferred::Deferred;
use super::service_locator::ServiceLocator;
use crate::ports::{CreatedInstance, InstanceCreator};
use crate::registry::ActiveDescriptor;
use locus_domain::value_objects::Instance;
use locus_domain::{Error, MultiResult};
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

#[derive(Default)]
struct HandleState {
    instance: Option<Instance>,
    owned: Option<Arc<CreatedInstance>>,
    destroyed: bool,
}

struct HandleInner {
    locator: ServiceLocator,
    descriptor: Arc<ActiveDescriptor>,
    state: Mutex<HandleState>,
}

/// Lazily populated reference to one service
#[derive(Clone)]
pub struct ServiceHandle {
    inner: Arc<HandleInner>,
}

impl ServiceHandle {
    pub(crate) fn new(locator: ServiceLocator, descriptor: Arc<ActiveDescriptor>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                locator,
                descriptor,
                state: Mutex::new(HandleState::default()),
            }),
        }
    }

    /// Descriptor behind this handle
    pub fn active_descriptor(&self) -> &Arc<ActiveDescriptor> {
        &self.inner.descriptor
    }

    /// The service, created on first call
    pub fn service(&self) -> MultiResult<Instance> {
        let descriptor = &self.inner.descriptor;
        let mut state = self.inner.state.lock();
        if state.destroyed {
            return Err(Error::illegal_state(format!("handle for {descriptor} was destroyed")).into());
        }
        if let Some(instance) = &state.instance {
            return Ok(instance.clone());
        }
        let owner = self.inner.locator.owner_of(descriptor)?;
        let context = owner.context_for(descriptor.scope())?;
        let instance = if context.retains_instances() {
            owner.create_in(&context, descriptor)?
        } else {
            let created = LocatorCreator::new(&owner).create(descriptor)?;
            let instance = created.instance().clone();
            state.owned = Some(Arc::new(created));
            instance
        };
        state.instance = Some(instance.clone());
        Ok(instance)
    }

    /// The service, downcast
    pub fn service_as<T: Any + Send + Sync>(&self) -> MultiResult<Arc<T>> {
        Deferred::resolve::<T>(&self.service()?)
    }

    /// Whether the service exists and has not been destroyed
    pub fn is_active(&self) -> bool {
        let state = self.inner.state.lock();
        if state.destroyed {
            return false;
        }
        if state.instance.is_some() {
            return true;
        }
        self.inner
            .locator
            .context_for(self.inner.descriptor.scope())
            .is_ok_and(|context| context.contains(&self.inner.descriptor))
    }

    /// Handles of per-lookup instances created while building this service
    pub fn sub_handles(&self) -> Vec<ServiceHandle> {
        self.inner
            .state
            .lock()
            .owned
            .as_ref()
            .map(|created| created.nested().to_vec())
            .unwrap_or_default()
    }

    /// Destroy the service; later calls do nothing
    pub fn destroy(&self) -> MultiResult<()> {
        let (instance, owned) = {
            let mut state = self.inner.state.lock();
            if state.destroyed {
                return Ok(());
            }
            state.destroyed = true;
            (state.instance.take(), state.owned.take())
        };
        if let Some(created) = owned {
            return created.destroy();
        }
        if instance.is_some() {
            let context = self.inner.locator.context_for(self.inner.descriptor.scope())?;
            context.destroy_one(&self.inner.descriptor);
        }
        Ok(())
    }
}

impl fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceHandle")
            .field("descriptor", &self.inner.descriptor.to_string())
            .field("active", &self.is_active())
            .finish()
    }
}
