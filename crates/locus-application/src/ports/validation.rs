//! Validation Service Port
//!
//! Validation services veto binds and unbinds at commit time and hide
//! descriptors from lookups.

use locus_domain::value_objects::Descriptor;
use std::fmt;

/// Operation being validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Bind,
    Unbind,
    Lookup,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind => write!(f, "bind"),
            Self::Unbind => write!(f, "unbind"),
            Self::Lookup => write!(f, "lookup"),
        }
    }
}

/// Gatekeeper for registry operations
pub trait ValidationService: Send + Sync {
    /// Name reported in validation failures
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Whether `operation` may proceed on `descriptor`
    fn validate(&self, operation: Operation, descriptor: &Descriptor) -> bool;
}
