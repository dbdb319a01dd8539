//! # Locus
//!
//! A dependency-injection runtime: descriptors are bound into a service
//! locator, reified into validated construction recipes and instantiated
//! inside scope contexts. A run-level controller activates services level by
//! level on bounded workers, and descriptors can be kept in plain text files.
//!
//! ## Example
//!
//! ```ignore
//! use locus::infrastructure::{Bootstrap, config::ConfigLoader};
//!
//! let config = ConfigLoader::new().load()?;
//! let runtime = Bootstrap::new(config).register(store_implementation).build()?;
//!
//! runtime.controller().proceed_to(5)?;
//! let store = runtime.locator().get::<SqlStore>()?;
//! runtime.shutdown()?;
//! ```
//!
//! ## Architecture
//!
//! - `domain` - descriptors, implementation models, filters and errors
//! - `application` - registry, reification, locator and built-in contexts
//! - `infrastructure` - run levels, descriptor files, locator factory,
//!   configuration and logging
//! - `cli` - the `locus` command line tool

/// Domain layer - descriptors, models and errors
///
/// Re-exports from the domain crate for convenience
pub mod domain {
    pub use locus_domain::*;
}

/// Application layer - registry, locator and contexts
///
/// Re-exports from the application crate for convenience
pub mod application {
    pub use locus_application::*;
}

/// Infrastructure layer - run levels, descriptor files and configuration
///
/// Re-exports from the infrastructure crate for convenience
pub mod infrastructure {
    pub use locus_infrastructure::*;
}

pub mod cli;

// Re-export commonly used types at the crate root
pub use domain::value_objects::{Descriptor, DescriptorBuilder};
pub use domain::{Error, ErrorKind, MultiError, MultiResult, Result};

pub use application::{ActiveDescriptor, DynamicConfiguration, ServiceLocator};
pub use infrastructure::{Bootstrap, RunLevelController, Runtime, ServiceLocatorFactory};
