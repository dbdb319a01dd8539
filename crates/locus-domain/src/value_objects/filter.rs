//! Descriptor filters
//!
//! Filters select descriptors for lookups, unbinds and idempotent-bind
//! checks. A filter that names a contract or a name lets the registry
//! narrow the search through its indices before calling [`Filter::matches`].

use super::descriptor::{Descriptor, DescriptorId};
use std::collections::BTreeSet;

/// Predicate over descriptors
pub trait Filter: Send + Sync {
    /// Whether the descriptor is selected
    fn matches(&self, descriptor: &Descriptor) -> bool;

    /// Contract every selected descriptor advertises, used as an index hint
    fn advertised_contract(&self) -> Option<&str> {
        None
    }

    /// Name every selected descriptor carries, used as an index hint
    fn name(&self) -> Option<&str> {
        None
    }

    /// A qualifier every selected descriptor carries, used as an index hint
    fn qualifier_hint(&self) -> Option<&str> {
        None
    }
}

impl<F> Filter for F
where
    F: Fn(&Descriptor) -> bool + Send + Sync,
{
    fn matches(&self, descriptor: &Descriptor) -> bool {
        self(descriptor)
    }
}

/// Selects every descriptor
#[derive(Debug, Clone, Copy, Default)]
pub struct AllFilter;

impl Filter for AllFilter {
    fn matches(&self, _descriptor: &Descriptor) -> bool {
        true
    }
}

/// Selects descriptors by contract, optional name and qualifiers
#[derive(Debug, Clone)]
pub struct ContractFilter {
    contract: String,
    name: Option<String>,
    qualifiers: BTreeSet<String>,
}

impl ContractFilter {
    /// Require a name
    pub fn named<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Require a qualifier
    pub fn qualified_by<S: Into<String>>(mut self, qualifier: S) -> Self {
        self.qualifiers.insert(qualifier.into());
        self
    }

    /// Require every qualifier of an iterator
    pub fn qualified_by_all<I, S>(mut self, qualifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.qualifiers.extend(qualifiers.into_iter().map(Into::into));
        self
    }

    /// Required qualifiers
    pub fn qualifiers(&self) -> &BTreeSet<String> {
        &self.qualifiers
    }
}

impl Filter for ContractFilter {
    fn matches(&self, descriptor: &Descriptor) -> bool {
        descriptor.advertises(&self.contract)
            && self
                .name
                .as_deref()
                .is_none_or(|name| descriptor.name() == Some(name))
            && descriptor.has_qualifiers(&self.qualifiers)
    }

    fn advertised_contract(&self) -> Option<&str> {
        Some(&self.contract)
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn qualifier_hint(&self) -> Option<&str> {
        self.qualifiers.iter().next().map(String::as_str)
    }
}

/// Selects the one descriptor carrying an id
#[derive(Debug, Clone, Copy)]
pub struct IdFilter(DescriptorId);

impl Filter for IdFilter {
    fn matches(&self, descriptor: &Descriptor) -> bool {
        descriptor.id() == Some(self.0)
    }
}

/// Selects descriptors equal to a reference descriptor
#[derive(Debug, Clone)]
pub struct EqualFilter(Descriptor);

impl Filter for EqualFilter {
    fn matches(&self, descriptor: &Descriptor) -> bool {
        *descriptor == self.0
    }

    fn advertised_contract(&self) -> Option<&str> {
        Some(self.0.implementation()).filter(|c| self.0.advertises(c))
    }
}

/// Select every descriptor
pub fn all() -> AllFilter {
    AllFilter
}

/// Select descriptors advertising a contract
pub fn contract<S: Into<String>>(contract: S) -> ContractFilter {
    ContractFilter {
        contract: contract.into(),
        name: None,
        qualifiers: BTreeSet::new(),
    }
}

/// Select the descriptor with an id
pub fn by_id(id: DescriptorId) -> IdFilter {
    IdFilter(id)
}

/// Select descriptors equal to `descriptor`
pub fn equal_to(descriptor: &Descriptor) -> EqualFilter {
    EqualFilter(descriptor.clone())
}
