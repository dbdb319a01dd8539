//! Descriptor value objects
//!
//! A [`Descriptor`] is the declarative record of one bindable unit: the
//! contracts it advertises, its scope, qualifiers, metadata and rank.
//! Descriptors are plain data; the recipe used to build instances travels
//! next to them when they are bound.

use crate::constants::{DEFAULT_RANK, DEFAULT_SCOPE};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Stable contract identifier for a Rust type
pub fn contract_of<T: ?Sized>() -> String {
    std::any::type_name::<T>().to_string()
}

/// Identifier assigned by a locator at bind time
///
/// Service ids are allocated from a per-locator monotonic counter and are
/// never reused, even when the batch that allocated them fails to commit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct DescriptorId {
    /// Locator that bound the descriptor
    pub locator_id: u64,
    /// Per-locator service id
    pub service_id: u64,
}

impl fmt::Display for DescriptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.locator_id, self.service_id)
    }
}

/// How instances of a descriptor are produced
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum DescriptorType {
    /// Built from an implementation's construction recipe
    #[default]
    Class,
    /// Produced by a factory
    ProvideMethod,
}

/// Declarative record describing one bindable unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Descriptor {
    implementation: String,
    contracts: BTreeSet<String>,
    scope: String,
    qualifiers: BTreeSet<String>,
    metadata: BTreeMap<String, Vec<String>>,
    rank: i32,
    name: Option<String>,
    descriptor_type: DescriptorType,
    proxiable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<DescriptorId>,
}

impl Descriptor {
    /// Start building a descriptor for an implementation
    pub fn builder<S: Into<String>>(implementation: S) -> DescriptorBuilder {
        DescriptorBuilder::new(implementation)
    }

    /// Implementation name
    pub fn implementation(&self) -> &str {
        &self.implementation
    }

    /// Advertised contracts
    pub fn contracts(&self) -> &BTreeSet<String> {
        &self.contracts
    }

    /// Scope identifier
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Qualifiers
    pub fn qualifiers(&self) -> &BTreeSet<String> {
        &self.qualifiers
    }

    /// Multi-valued metadata
    pub fn metadata(&self) -> &BTreeMap<String, Vec<String>> {
        &self.metadata
    }

    /// All values recorded for a metadata key
    pub fn metadata_values(&self, key: &str) -> &[String] {
        self.metadata.get(key).map_or(&[], Vec::as_slice)
    }

    /// First value recorded for a metadata key
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata_values(key).first().map(String::as_str)
    }

    /// Rank, higher wins
    pub fn rank(&self) -> i32 {
        self.rank
    }

    /// Optional name
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Descriptor type
    pub fn descriptor_type(&self) -> DescriptorType {
        self.descriptor_type
    }

    /// Explicit proxy preference; `None` defers to the scope
    pub fn proxiable(&self) -> Option<bool> {
        self.proxiable
    }

    /// Locator-assigned identifier, once bound
    pub fn id(&self) -> Option<DescriptorId> {
        self.id
    }

    /// Per-locator service id, once bound
    pub fn service_id(&self) -> Option<u64> {
        self.id.map(|id| id.service_id)
    }

    /// Id of the locator that bound this descriptor
    pub fn locator_id(&self) -> Option<u64> {
        self.id.map(|id| id.locator_id)
    }

    /// Whether `contract` is advertised
    pub fn advertises(&self, contract: &str) -> bool {
        self.contracts.contains(contract)
    }

    /// Whether every required qualifier is carried by this descriptor
    pub fn has_qualifiers<'a, I>(&self, required: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        required.into_iter().all(|q| self.qualifiers.contains(q))
    }

    /// Copy of this descriptor carrying a locator-assigned id
    pub fn with_id(mut self, id: DescriptorId) -> Self {
        self.id = Some(id);
        self
    }

    /// Copy of this descriptor with a different rank
    pub fn with_rank(mut self, rank: i32) -> Self {
        self.rank = rank;
        self
    }
}

impl PartialEq for Descriptor {
    fn eq(&self, other: &Self) -> bool {
        self.implementation == other.implementation
            && self.contracts == other.contracts
            && self.scope == other.scope
            && self.qualifiers == other.qualifiers
            && self.metadata == other.metadata
            && self.name == other.name
            && self.rank == other.rank
    }
}

impl Eq for Descriptor {}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}(name={})", self.implementation, name),
            None => write!(f, "{}", self.implementation),
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Fluent builder for [`Descriptor`]
///
/// # Example
///
/// ```
/// use locus_domain::value_objects::Descriptor;
///
/// let descriptor = Descriptor::builder("app::SqlStore")
///     .to("app::Store")
///     .named("primary")
///     .in_scope("Singleton")
///     .has_metadata("pool", "8")
///     .ranked(10)
///     .build();
///
/// assert!(descriptor.advertises("app::Store"));
/// assert!(descriptor.advertises("app::SqlStore"));
/// assert_eq!(descriptor.name(), Some("primary"));
/// ```
#[derive(Debug, Clone)]
pub struct DescriptorBuilder {
    descriptor: Descriptor,
    implementation_contract: bool,
}

impl DescriptorBuilder {
    /// Start a descriptor for an implementation
    pub fn new<S: Into<String>>(implementation: S) -> Self {
        Self {
            descriptor: Descriptor {
                implementation: implementation.into(),
                contracts: BTreeSet::new(),
                scope: DEFAULT_SCOPE.to_string(),
                qualifiers: BTreeSet::new(),
                metadata: BTreeMap::new(),
                rank: DEFAULT_RANK,
                name: None,
                descriptor_type: DescriptorType::Class,
                proxiable: None,
                id: None,
            },
            implementation_contract: true,
        }
    }

    /// Advertise a contract
    pub fn to<S: Into<String>>(mut self, contract: S) -> Self {
        self.descriptor.contracts.insert(contract.into());
        self
    }

    /// Advertise the contract of a Rust type
    pub fn to_type<T: ?Sized>(self) -> Self {
        self.to(contract_of::<T>())
    }

    /// Set the name
    pub fn named<S: Into<String>>(mut self, name: S) -> Self {
        self.descriptor.name = Some(name.into());
        self
    }

    /// Set the scope
    pub fn in_scope<S: Into<String>>(mut self, scope: S) -> Self {
        self.descriptor.scope = scope.into();
        self
    }

    /// Add a qualifier
    pub fn qualified_by<S: Into<String>>(mut self, qualifier: S) -> Self {
        self.descriptor.qualifiers.insert(qualifier.into());
        self
    }

    /// Append a metadata value
    pub fn has_metadata<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.descriptor
            .metadata
            .entry(key.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Set the rank
    pub fn ranked(mut self, rank: i32) -> Self {
        self.descriptor.rank = rank;
        self
    }

    /// Set the proxy preference
    pub fn proxy(mut self, proxiable: bool) -> Self {
        self.descriptor.proxiable = Some(proxiable);
        self
    }

    /// Mark the descriptor as produced by a factory
    pub fn provide_method(mut self) -> Self {
        self.descriptor.descriptor_type = DescriptorType::ProvideMethod;
        self
    }

    /// Do not advertise the implementation name as a contract
    pub fn without_implementation_contract(mut self) -> Self {
        self.implementation_contract = false;
        self
    }

    /// Finish the descriptor
    pub fn build(mut self) -> Descriptor {
        if self.implementation_contract {
            let implementation = self.descriptor.implementation.clone();
            self.descriptor.contracts.insert(implementation);
        }
        self.descriptor
    }
}
