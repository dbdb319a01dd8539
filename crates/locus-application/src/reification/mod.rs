//! Reification
//!
//! Model analysis, memoized reification, the injectee resolution cache and
//! circular dependency detection.

pub mod analysis;
pub mod cycle;
pub mod engine;

pub use analysis::analyze;
pub use cycle::{CreationGuard, CreationStack, WaitGraph, WaitRegistration};
pub use engine::ReificationEngine;
