//! Construction recipe port
//!
//! Bindable types implement [`Implementation`] instead of being discovered
//! by runtime introspection: they report their shape once and build
//! instances from the values the engine resolved for them.

use crate::error::Result;
use crate::value_objects::{ImplementationModel, Instance, ResolvedArguments};
use std::fmt;
use std::sync::Arc;

/// Construction recipe of a bindable type
pub trait Implementation: Send + Sync + 'static {
    /// Declared constructors, fields and methods
    fn model(&self) -> ImplementationModel;

    /// Build an instance from resolved injectee values
    fn construct(&self, arguments: &ResolvedArguments) -> Result<Instance>;

    /// Called once after construction, before the instance is published
    fn post_construct(&self, _instance: &Instance) -> Result<()> {
        Ok(())
    }

    /// Called once when the instance is destroyed
    fn pre_destroy(&self, _instance: &Instance) -> Result<()> {
        Ok(())
    }
}

type ConstructFn = dyn Fn(&ResolvedArguments) -> Result<Instance> + Send + Sync;
type HookFn = dyn Fn(&Instance) -> Result<()> + Send + Sync;

/// Closure-backed [`Implementation`]
///
/// # Example
///
/// ```
/// use locus_domain::ports::ImplementationFn;
/// use locus_domain::value_objects::{ImplementationModel, Instance};
///
/// struct Clock;
///
/// let clock = ImplementationFn::new(ImplementationModel::simple("app::Clock"), |_| {
///     Ok(Instance::new(Clock))
/// });
/// ```
pub struct ImplementationFn {
    model: ImplementationModel,
    construct: Box<ConstructFn>,
    post_construct: Option<Box<HookFn>>,
    pre_destroy: Option<Box<HookFn>>,
}

impl ImplementationFn {
    /// Recipe from a model and a construction closure
    pub fn new<F>(model: ImplementationModel, construct: F) -> Self
    where
        F: Fn(&ResolvedArguments) -> Result<Instance> + Send + Sync + 'static,
    {
        Self {
            model,
            construct: Box::new(construct),
            post_construct: None,
            pre_destroy: None,
        }
    }

    /// Run a hook after construction
    pub fn with_post_construct<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Instance) -> Result<()> + Send + Sync + 'static,
    {
        self.post_construct = Some(Box::new(hook));
        self
    }

    /// Run a hook on destruction
    pub fn with_pre_destroy<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Instance) -> Result<()> + Send + Sync + 'static,
    {
        self.pre_destroy = Some(Box::new(hook));
        self
    }

    /// Share as a trait object
    pub fn into_arc(self) -> Arc<dyn Implementation> {
        Arc::new(self)
    }
}

impl Implementation for ImplementationFn {
    fn model(&self) -> ImplementationModel {
        self.model.clone()
    }

    fn construct(&self, arguments: &ResolvedArguments) -> Result<Instance> {
        (self.construct)(arguments)
    }

    fn post_construct(&self, instance: &Instance) -> Result<()> {
        self.post_construct
            .as_ref()
            .map_or(Ok(()), |hook| hook(instance))
    }

    fn pre_destroy(&self, instance: &Instance) -> Result<()> {
        self.pre_destroy.as_ref().map_or(Ok(()), |hook| hook(instance))
    }
}

impl fmt::Debug for ImplementationFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImplementationFn")
            .field("model", &self.model.name)
            .finish_non_exhaustive()
    }
}
