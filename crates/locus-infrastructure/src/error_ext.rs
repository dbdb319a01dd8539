//! Error extension utilities
//!
//! Maps foreign errors (I/O, figment, TOML) into domain errors with a
//! context message.

use locus_domain::error::{Error, Result};
use std::fmt;

/// Extension trait for adding context to errors
///
/// # Example
///
/// ```no_run
/// use locus_infrastructure::error_ext::ErrorContext;
///
/// # fn read() -> locus_domain::Result<String> {
/// let path = "services.locus";
/// let content = std::fs::read_to_string(path)
///     .io_context(format!("Failed to read descriptor file {path}"))?;
/// # Ok(content)
/// # }
/// ```
pub trait ErrorContext<T> {
    /// Add context to an I/O failure
    fn io_context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display;

    /// Add context to a configuration failure
    fn config_context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display;

    /// Add context with lazy evaluation for expensive context creation
    fn with_config_context<C, F>(self, f: F) -> Result<T>
    where
        C: fmt::Display,
        F: FnOnce() -> C;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn io_context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display,
    {
        self.map_err(|err| Error::io_with_source(format!("{context}: {err}"), err))
    }

    fn config_context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display,
    {
        self.map_err(|err| Error::configuration_with_source(format!("{context}: {err}"), err))
    }

    fn with_config_context<C, F>(self, f: F) -> Result<T>
    where
        C: fmt::Display,
        F: FnOnce() -> C,
    {
        self.map_err(|err| Error::configuration_with_source(format!("{}: {err}", f()), err))
    }
}
