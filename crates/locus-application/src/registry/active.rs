//! Bound descriptors
//!
//! An [`ActiveDescriptor`] is a descriptor the locator has accepted: it
//! carries its locator-assigned id, the recipe that produces its instances
//! and, once reified, the analyzed list of injectees.

use crate::ports::Factory;
use locus_domain::MultiResult;
use locus_domain::ports::Implementation;
use locus_domain::value_objects::{Descriptor, DescriptorId, Injectee, Instance};
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, OnceLock};

/// How instances of a bound descriptor are produced
#[derive(Clone)]
pub enum Recipe {
    /// Load the implementation registered under the descriptor's
    /// implementation name when first reified
    Lazy,
    /// Build through an explicit construction recipe
    Implementation(Arc<dyn Implementation>),
    /// Ask a factory
    Factory(Arc<dyn Factory>),
    /// Always hand out the same pre-built instance
    Constant(Instance),
}

impl fmt::Debug for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lazy => write!(f, "Lazy"),
            Self::Implementation(_) => write!(f, "Implementation"),
            Self::Factory(_) => write!(f, "Factory"),
            Self::Constant(instance) => write!(f, "Constant({instance:?})"),
        }
    }
}

/// Outcome of a successful reification
#[derive(Clone)]
pub struct Reification {
    /// Injectees in constructor, field, method order
    pub injectees: Arc<[Injectee]>,
    /// Construction recipe, absent for factories and constants
    pub implementation: Option<Arc<dyn Implementation>>,
}

/// A descriptor accepted by a locator
pub struct ActiveDescriptor {
    descriptor: Descriptor,
    id: DescriptorId,
    recipe: Recipe,
    reified: OnceLock<MultiResult<Reification>>,
}

impl ActiveDescriptor {
    pub(crate) fn new(descriptor: Descriptor, id: DescriptorId, recipe: Recipe) -> Self {
        Self {
            descriptor: descriptor.with_id(id),
            id,
            recipe,
            reified: OnceLock::new(),
        }
    }

    /// The declarative record, carrying its id
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Locator-assigned identifier
    pub fn id(&self) -> DescriptorId {
        self.id
    }

    /// Instance recipe
    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    /// Whether reification ran and succeeded
    pub fn is_reified(&self) -> bool {
        matches!(self.reified.get(), Some(Ok(_)))
    }

    /// Cached reification failure, if reification ran and failed
    pub fn reification_errors(&self) -> Option<&locus_domain::MultiError> {
        self.reified.get().and_then(|outcome| outcome.as_ref().err())
    }

    /// Analyzed injectees, once reified
    pub fn injectees(&self) -> Option<&[Injectee]> {
        match self.reified.get() {
            Some(Ok(reification)) => Some(&reification.injectees),
            _ => None,
        }
    }

    /// Memoized reification; `analyze` runs at most once per descriptor
    pub(crate) fn reify_with<F>(&self, analyze: F) -> MultiResult<&Reification>
    where
        F: FnOnce() -> MultiResult<Reification>,
    {
        self.reified.get_or_init(analyze).as_ref().map_err(Clone::clone)
    }
}

impl Deref for ActiveDescriptor {
    type Target = Descriptor;

    fn deref(&self) -> &Descriptor {
        &self.descriptor
    }
}

impl fmt::Display for ActiveDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.descriptor, f)
    }
}

impl fmt::Debug for ActiveDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveDescriptor")
            .field("id", &self.id)
            .field("descriptor", &self.descriptor)
            .field("recipe", &self.recipe)
            .field("reified", &self.is_reified())
            .finish()
    }
}
