//! Ports
//!
//! Extension points of the locator. Each port is registered through a
//! dynamic configuration (contexts, resolvers, error and validation
//! services) or directly on the locator (listeners).

pub mod context;
pub mod error_service;
pub mod factory;
pub mod listener;
pub mod resolver;
pub mod validation;

pub use context::{Context, CreatedInstance, Disposal, InstanceCreator};
pub use error_service::{ErrorInformation, ErrorService, ErrorType};
pub use factory::Factory;
pub use listener::ConfigurationListener;
pub use resolver::{DEFAULT_RESOLVER_RANK, InjectionResolver, RankedResolver, ResolutionRequest};
pub use validation::{Operation, ValidationService};
