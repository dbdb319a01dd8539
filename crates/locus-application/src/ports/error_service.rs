//! Error Service Port
//!
//! Error services are told about construction, destruction and lookup
//! failures after the locator has already decided how to report them.
//! They observe; they cannot change the outcome.

use locus_domain::MultiError;
use locus_domain::value_objects::{Descriptor, Injectee};

/// Category of a reported failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// Constructing, injecting or initializing a service failed
    ServiceCreationFailure,
    /// A destroy hook failed
    ServiceDestructionFailure,
    /// No value could be resolved for an injection point
    DynamicLookupFailure,
}

/// What failed and why
#[derive(Debug, Clone)]
pub struct ErrorInformation {
    pub error_type: ErrorType,
    /// Descriptor involved, when known
    pub descriptor: Option<Descriptor>,
    /// Injection point involved, for lookup failures
    pub injectee: Option<Injectee>,
    pub error: MultiError,
}

/// Observer of runtime failures
pub trait ErrorService: Send + Sync {
    fn on_failure(&self, information: &ErrorInformation);
}

impl<F> ErrorService for F
where
    F: Fn(&ErrorInformation) + Send + Sync,
{
    fn on_failure(&self, information: &ErrorInformation) {
        self(information)
    }
}
