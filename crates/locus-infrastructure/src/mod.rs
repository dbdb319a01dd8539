//! # Infrastructure Layer
//!
//! Everything around the locator core: staged activation, descriptor files,
//! named locators and the ambient stack.
//!
//! ## Module Categories
//!
//! ### Run Levels
//! | Module | Description |
//! |--------|-------------|
//! | [`run_level`] | Level-by-level activation on bounded workers, cancellation, listeners |
//!
//! ### Descriptors & Locators
//! | Module | Description |
//! |--------|-------------|
//! | [`format`] | Line-oriented descriptor interchange format |
//! | [`populator`] | Binds descriptor files into a locator |
//! | [`factory`] | Process-wide registry of named locators |
//! | [`bootstrap`] | Composition root building a [`bootstrap::Runtime`] |
//!
//! ### Configuration & Observability
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Figment configuration: defaults, TOML, environment |
//! | [`constants`] | Centralized configuration constants |
//! | [`logging`] | Structured logging with tracing |

pub mod bootstrap;
pub mod config;
pub mod constants;
pub mod error_ext;
pub mod factory;
pub mod format;
pub mod logging;
pub mod populator;
pub mod run_level;

// Re-export commonly used types
pub use bootstrap::{Bootstrap, Runtime};
pub use error_ext::ErrorContext;
pub use factory::{CreatePolicy, ServiceLocatorFactory};
pub use run_level::{RunLevelController, RunLevelFuture, RunLevelListener};

// Internal tests module (can access pub(crate) items)
#[cfg(test)]
mod tests;
