//! Factory Port
//!
//! Descriptors bound with a [`Factory`] get their instances from it instead
//! of from an implementation's construction recipe. The factory receives
//! the locator so it can look up whatever it needs.

use crate::locator::ServiceLocator;
use locus_domain::value_objects::Instance;
use locus_domain::{MultiResult, Result};

/// Producer of service instances
pub trait Factory: Send + Sync + 'static {
    /// Produce a new instance
    fn provide(&self, locator: &ServiceLocator) -> MultiResult<Instance>;

    /// Release an instance produced by [`Factory::provide`]
    fn dispose(&self, _instance: &Instance) -> Result<()> {
        Ok(())
    }
}

impl<F> Factory for F
where
    F: Fn(&ServiceLocator) -> MultiResult<Instance> + Send + Sync + 'static,
{
    fn provide(&self, locator: &ServiceLocator) -> MultiResult<Instance> {
        self(locator)
    }
}
