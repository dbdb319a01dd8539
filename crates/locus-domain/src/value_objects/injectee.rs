//! Injection points and injectees
//!
//! An [`InjectionPoint`] is what an implementation declares it needs. Once
//! placed on a constructor, field or method of a particular implementation
//! it becomes an [`Injectee`]. Injectees compare structurally through
//! [`InjecteeKey`], so two reifications of identical implementations share
//! resolution cache entries.

use super::descriptor::{DescriptorId, contract_of};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// What an injection point receives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InjectionKind {
    /// The best matching service
    #[default]
    Service,
    /// Every matching service, best first
    AllServices,
    /// A handle that looks the service up when first used
    Deferred,
}

/// Element of an implementation that carries injection points
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InjectionSite {
    Constructor,
    Field(String),
    Method(String),
}

impl fmt::Display for InjectionSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constructor => write!(f, "constructor"),
            Self::Field(name) => write!(f, "field {name}"),
            Self::Method(name) => write!(f, "method {name}"),
        }
    }
}

/// A declared dependency
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InjectionPoint {
    /// Required contract
    pub contract: String,
    /// Required qualifiers
    pub qualifiers: BTreeSet<String>,
    /// Resolve to nothing instead of failing when unsatisfied
    pub optional: bool,
    /// Request the owning descriptor instead of a service
    pub is_self: bool,
    /// Shape of the injected value
    pub kind: InjectionKind,
    /// Typed as a declarative marker rather than a service contract
    pub marker_typed: bool,
}

impl InjectionPoint {
    /// Require a contract
    pub fn of<S: Into<String>>(contract: S) -> Self {
        Self {
            contract: contract.into(),
            qualifiers: BTreeSet::new(),
            optional: false,
            is_self: false,
            kind: InjectionKind::Service,
            marker_typed: false,
        }
    }

    /// Require the contract of a Rust type
    pub fn of_type<T: ?Sized>() -> Self {
        Self::of(contract_of::<T>())
    }

    /// Request the descriptor of the implementation being built
    pub fn self_descriptor() -> Self {
        Self {
            is_self: true,
            ..Self::of("")
        }
    }

    /// Add a required qualifier
    pub fn qualified_by<S: Into<String>>(mut self, qualifier: S) -> Self {
        self.qualifiers.insert(qualifier.into());
        self
    }

    /// Mark as optional
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Receive every matching service
    pub fn all(mut self) -> Self {
        self.kind = InjectionKind::AllServices;
        self
    }

    /// Receive a deferred handle
    pub fn deferred(mut self) -> Self {
        self.kind = InjectionKind::Deferred;
        self
    }

    /// Mark the parameter as typed by a declarative marker
    pub fn marker_typed(mut self) -> Self {
        self.marker_typed = true;
        self
    }
}

/// Back-reference from an injectee to the descriptor that owns it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    /// Locator id of the owner, when bound
    pub id: Option<DescriptorId>,
    /// Implementation name of the owner
    pub implementation: String,
}

/// A resolved dependency slot of one implementation
#[derive(Debug, Clone)]
pub struct Injectee {
    point: InjectionPoint,
    site: InjectionSite,
    position: usize,
    parent: Option<ParentRef>,
}

impl Injectee {
    /// Place an injection point on a site
    pub fn new(point: InjectionPoint, site: InjectionSite, position: usize) -> Self {
        Self {
            point,
            site,
            position,
            parent: None,
        }
    }

    /// Attach the owning descriptor
    pub fn with_parent(mut self, parent: ParentRef) -> Self {
        self.parent = Some(parent);
        self
    }

    /// The declared injection point
    pub fn point(&self) -> &InjectionPoint {
        &self.point
    }

    /// Required contract
    pub fn required_type(&self) -> &str {
        &self.point.contract
    }

    /// Required qualifiers
    pub fn qualifiers(&self) -> &BTreeSet<String> {
        &self.point.qualifiers
    }

    /// Element carrying this injectee
    pub fn site(&self) -> &InjectionSite {
        &self.site
    }

    /// Parameter position (0 for fields)
    pub fn position(&self) -> usize {
        self.position
    }

    /// Whether unsatisfied resolution yields nothing instead of an error
    pub fn is_optional(&self) -> bool {
        self.point.optional
    }

    /// Whether the owning descriptor itself is requested
    pub fn is_self(&self) -> bool {
        self.point.is_self
    }

    /// Shape of the injected value
    pub fn kind(&self) -> InjectionKind {
        self.point.kind
    }

    /// Owning descriptor
    pub fn parent(&self) -> Option<&ParentRef> {
        self.parent.as_ref()
    }

    /// Structural cache key (excludes the owner's locator id)
    pub fn key(&self) -> InjecteeKey {
        InjecteeKey {
            point: self.point.clone(),
            site: self.site.clone(),
            position: self.position,
            parent_implementation: self.parent.as_ref().map(|p| p.implementation.clone()),
        }
    }
}

impl fmt::Display for Injectee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let owner = self
            .parent
            .as_ref()
            .map_or("<unbound>", |p| p.implementation.as_str());
        write!(
            f,
            "{} parameter {} of {} requiring {}",
            self.site, self.position, owner, self.point.contract
        )?;
        if !self.point.qualifiers.is_empty() {
            let qualifiers: Vec<&str> = self.point.qualifiers.iter().map(String::as_str).collect();
            write!(f, " qualified by [{}]", qualifiers.join(", "))?;
        }
        Ok(())
    }
}

/// Structural identity of an injectee
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InjecteeKey {
    point: InjectionPoint,
    site: InjectionSite,
    position: usize,
    parent_implementation: Option<String>,
}
