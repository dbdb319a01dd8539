//! # Locus Domain
//!
//! Core types of the locus dependency-injection runtime.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`value_objects`] | Descriptors, injection points, implementation models, filters |
//! | [`ports`] | Construction recipes implemented by bindable types |
//! | [`error`] | Single-cause errors and the aggregate [`MultiError`](error::MultiError) |
//! | [`constants`] | Scope identifiers and well-known metadata keys |
//!
//! This crate holds no locks and starts no threads; the registry, contexts
//! and schedulers built on these types live in the application and
//! infrastructure layers.

pub mod constants;
pub mod error;
pub mod ports;
pub mod value_objects;

pub use error::{Error, ErrorKind, MultiError, MultiResult, Result};
pub use value_objects::filter;
