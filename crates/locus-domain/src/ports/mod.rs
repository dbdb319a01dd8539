//! Domain ports
//!
//! Traits implemented outside the runtime and consumed by it.

pub mod implementation;

pub use implementation::{Implementation, ImplementationFn};
