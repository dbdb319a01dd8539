//! Application Layer - Locus
//!
//! This crate contains the runtime core of locus: the descriptor registry,
//! the reification engine, the service locator and the built-in contexts.
//!
//! ## Architecture
//!
//! The application layer:
//! - Publishes registry snapshots lock-free and applies changes in atomic,
//!   versioned commits ([`registry`])
//! - Validates implementation models and caches injectee resolutions
//!   ([`reification`])
//! - Serves lookups, handles and deferred services ([`locator`])
//! - Manages instance lifetimes per scope ([`contexts`])
//!
//! ## Ports (Interfaces)
//!
//! Extension points registered through a dynamic configuration:
//! - [`ports::Context`]: lifetime management for a scope
//! - [`ports::InjectionResolver`]: ranked value resolution strategies
//! - [`ports::ErrorService`], [`ports::ValidationService`]: failure observers
//!   and registry gatekeepers
//! - [`ports::Factory`]: instance producers
//!
//! ## Dependencies
//!
//! This crate depends only on:
//! - `locus-domain`: descriptors, models, filters and errors
//! - Concurrency primitives (`dashmap`, `arc-swap`, `parking_lot`) and `tracing`

pub mod contexts;
pub mod locator;
pub mod ports;
pub mod reification;
pub mod registry;

pub use contexts::{ScopeGuard, ScopedContext};
pub use locator::{Deferred, ServiceHandle, ServiceLocator};
pub use registry::{ActiveDescriptor, DynamicConfiguration};
