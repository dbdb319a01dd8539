//! Instance construction
//!
//! [`LocatorCreator`] is the [`InstanceCreator`] the locator hands to
//! contexts. It guards against cycles, resolves every injectee through the
//! ranked resolver chain, runs the construction recipe and the
//! post-construct hook, and records per-lookup dependencies so they are
//! destroyed with the instance.

use super::deferred::Deferred;
use super::service_locator::ServiceLocator;
use crate::ports::{
    CreatedInstance, DEFAULT_RESOLVER_RANK, Disposal, ErrorType, InstanceCreator,
    ResolutionRequest,
};
use crate::reification::CreationStack;
use crate::registry::{ActiveDescriptor, Recipe};
use locus_domain::ports::Implementation;
use locus_domain::value_objects::{
    Injectee, InjectionKind, Instance, ResolvedArguments, ResolvedValue, filter,
};
use locus_domain::{Error, ErrorKind, MultiError, MultiResult};
use std::cell::RefCell;
use std::sync::Arc;
use tracing::{trace, warn};

pub(crate) struct LocatorCreator<'a> {
    locator: &'a ServiceLocator,
}

impl<'a> LocatorCreator<'a> {
    pub(crate) fn new(locator: &'a ServiceLocator) -> Self {
        Self { locator }
    }

    fn build(&self, descriptor: &Arc<ActiveDescriptor>) -> MultiResult<CreatedInstance> {
        let reification = self.locator.reification(descriptor)?;
        match descriptor.recipe() {
            Recipe::Constant(instance) => Ok(CreatedInstance::new(
                instance.clone(),
                Arc::clone(descriptor),
                Disposal::Nothing,
                Vec::new(),
            )),
            Recipe::Factory(factory) => {
                let instance = factory
                    .provide(self.locator)
                    .map_err(|errors| creation_failure(descriptor, errors))?;
                Ok(CreatedInstance::new(
                    instance,
                    Arc::clone(descriptor),
                    Disposal::Factory(Arc::clone(factory)),
                    Vec::new(),
                ))
            }
            Recipe::Implementation(_) | Recipe::Lazy => {
                let implementation = reification.implementation.clone().ok_or_else(|| {
                    Error::reification(descriptor.implementation(), "no construction recipe")
                })?;
                self.construct(descriptor, implementation, &reification.injectees)
            }
        }
    }

    fn construct(
        &self,
        descriptor: &Arc<ActiveDescriptor>,
        implementation: Arc<dyn Implementation>,
        injectees: &[Injectee],
    ) -> MultiResult<CreatedInstance> {
        let nested = RefCell::new(Vec::new());
        let request = ResolutionRequest::new(self.locator, descriptor, &nested);
        let mut arguments = ResolvedArguments::new();
        let mut errors = MultiError::new();
        for injectee in injectees {
            match self.resolve(injectee, &request) {
                Ok(value) => arguments.push(injectee.clone(), value),
                Err(e) => errors.absorb(e),
            }
        }

        let built = if errors.is_empty() {
            implementation
                .construct(&arguments)
                .and_then(|instance| {
                    implementation.post_construct(&instance)?;
                    Ok(instance)
                })
                .map_err(|e| creation_failure(descriptor, e.into()))
        } else {
            Err(errors)
        };

        let nested = nested.into_inner();
        match built {
            Ok(instance) => {
                trace!(descriptor = %descriptor, nested = nested.len(), "Service constructed");
                Ok(CreatedInstance::new(
                    instance,
                    Arc::clone(descriptor),
                    Disposal::Implementation(implementation),
                    nested,
                ))
            }
            Err(errors) => {
                for handle in nested.iter().rev() {
                    if let Err(e) = handle.destroy() {
                        warn!(
                            descriptor = %descriptor,
                            nested = %handle.active_descriptor(),
                            error = %e,
                            "Nested service destruction failed"
                        );
                    }
                }
                Err(errors)
            }
        }
    }

    /// Ask custom resolvers ranked at or above the built-in one, then the
    /// built-in resolver, then the remaining custom resolvers
    fn resolve(&self, injectee: &Injectee, request: &ResolutionRequest<'_>) -> MultiResult<ResolvedValue> {
        let snapshot = self.locator.snapshot();
        let (preferred, fallback): (Vec<_>, Vec<_>) = snapshot
            .resolvers
            .iter()
            .partition(|ranked| ranked.rank >= DEFAULT_RESOLVER_RANK);
        for ranked in preferred {
            if let Some(value) = ranked.resolver.resolve(injectee, request)? {
                return Ok(value);
            }
        }
        if let Some(value) = self.resolve_default(injectee, request)? {
            return Ok(value);
        }
        for ranked in fallback {
            if let Some(value) = ranked.resolver.resolve(injectee, request)? {
                return Ok(value);
            }
        }

        if injectee.is_optional() {
            return Ok(match injectee.kind() {
                InjectionKind::AllServices => ResolvedValue::All(Vec::new()),
                _ => ResolvedValue::Single(None),
            });
        }
        let error: MultiError = Error::UnsatisfiedDependency {
            injectee: injectee.to_string(),
            message: "no registered service satisfies it".to_string(),
        }
        .into();
        self.locator.report_failure(
            ErrorType::DynamicLookupFailure,
            Some(request.parent().descriptor()),
            Some(injectee),
            &error,
        );
        Err(error)
    }

    fn resolve_default(
        &self,
        injectee: &Injectee,
        request: &ResolutionRequest<'_>,
    ) -> MultiResult<Option<ResolvedValue>> {
        if injectee.is_self() {
            let own = request.parent().descriptor().clone();
            return Ok(Some(ResolvedValue::Single(Some(Instance::new(own)))));
        }
        match injectee.kind() {
            InjectionKind::Service => match self.locator.best_for_injectee(injectee)? {
                Some(best) => {
                    let instance = self.locator.instance_for(&best, Some(request))?;
                    Ok(Some(ResolvedValue::Single(Some(instance))))
                }
                None => Ok(None),
            },
            InjectionKind::AllServices => {
                let matching = filter::contract(injectee.required_type())
                    .qualified_by_all(injectee.qualifiers().iter().cloned());
                let descriptors = self.locator.get_descriptors(&matching)?;
                let instances = self.locator.instances_for(&descriptors, Some(request))?;
                Ok(Some(ResolvedValue::All(instances)))
            }
            InjectionKind::Deferred => Ok(Some(ResolvedValue::Single(Some(Instance::new(
                Deferred::for_lookup(
                    self.locator.clone(),
                    injectee.required_type(),
                    injectee.qualifiers().iter().cloned().collect(),
                ),
            ))))),
        }
    }
}

impl InstanceCreator for LocatorCreator<'_> {
    fn create(&self, descriptor: &Arc<ActiveDescriptor>) -> MultiResult<CreatedInstance> {
        let _frame = CreationStack::enter(descriptor)?;
        let created = self.build(descriptor);
        if let Err(errors) = &created {
            self.locator.report_failure(
                ErrorType::ServiceCreationFailure,
                Some(descriptor.descriptor()),
                None,
                errors,
            );
        }
        created
    }
}

/// Keep engine errors as they are; wrap anything a recipe or hook raised
fn creation_failure(descriptor: &ActiveDescriptor, errors: MultiError) -> MultiError {
    errors
        .into_errors()
        .into_iter()
        .map(|error| match error.kind() {
            ErrorKind::CircularDependency
            | ErrorKind::UnsatisfiedDependency
            | ErrorKind::NoActiveContext
            | ErrorKind::ServiceCreation
            | ErrorKind::RunLevelActivation
            | ErrorKind::Shutdown => error,
            _ => Error::creation_with_source(descriptor.to_string(), error),
        })
        .collect()
}
