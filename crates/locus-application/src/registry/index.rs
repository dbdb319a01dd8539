//! Descriptor indices
//!
//! Every bound descriptor is kept in an ordered set over all descriptors
//! and in one ordered set per advertised contract, name and qualifier.
//! The order is the lookup order: descending rank, then ascending locator
//! id, then ascending service id.

use super::active::ActiveDescriptor;
use locus_domain::value_objects::Filter;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Position of a descriptor in lookup order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderKey {
    rank: Reverse<i32>,
    locator_id: u64,
    service_id: u64,
}

impl OrderKey {
    /// Order key of a bound descriptor
    pub fn of(descriptor: &ActiveDescriptor) -> Self {
        let id = descriptor.id();
        Self {
            rank: Reverse(descriptor.rank()),
            locator_id: id.locator_id,
            service_id: id.service_id,
        }
    }
}

type Ordered = BTreeMap<OrderKey, Arc<ActiveDescriptor>>;

/// Immutable-by-convention index set; cloned and modified under the commit lock
#[derive(Clone, Default)]
pub struct DescriptorIndex {
    all: Ordered,
    by_contract: HashMap<String, Ordered>,
    by_name: HashMap<String, Ordered>,
    by_qualifier: HashMap<String, Ordered>,
}

impl DescriptorIndex {
    /// Number of indexed descriptors
    pub fn len(&self) -> usize {
        self.all.len()
    }

    /// Whether nothing is indexed
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Add a descriptor to every index it belongs to
    pub fn insert(&mut self, descriptor: Arc<ActiveDescriptor>) {
        let key = OrderKey::of(&descriptor);
        for contract in descriptor.contracts() {
            self.by_contract
                .entry(contract.clone())
                .or_default()
                .insert(key, Arc::clone(&descriptor));
        }
        if let Some(name) = descriptor.name() {
            self.by_name
                .entry(name.to_string())
                .or_default()
                .insert(key, Arc::clone(&descriptor));
        }
        for qualifier in descriptor.qualifiers() {
            self.by_qualifier
                .entry(qualifier.clone())
                .or_default()
                .insert(key, Arc::clone(&descriptor));
        }
        self.all.insert(key, descriptor);
    }

    /// Remove a descriptor from every index
    pub fn remove(&mut self, descriptor: &ActiveDescriptor) -> Option<Arc<ActiveDescriptor>> {
        let key = OrderKey::of(descriptor);
        let removed = self.all.remove(&key)?;
        for contract in removed.contracts() {
            Self::remove_from(&mut self.by_contract, contract, &key);
        }
        if let Some(name) = removed.name() {
            Self::remove_from(&mut self.by_name, name, &key);
        }
        for qualifier in removed.qualifiers() {
            Self::remove_from(&mut self.by_qualifier, qualifier, &key);
        }
        Some(removed)
    }

    fn remove_from(index: &mut HashMap<String, Ordered>, bucket: &str, key: &OrderKey) {
        if let Some(entries) = index.get_mut(bucket) {
            entries.remove(key);
            if entries.is_empty() {
                index.remove(bucket);
            }
        }
    }

    /// Whether a descriptor with this order key is indexed
    pub fn contains(&self, descriptor: &ActiveDescriptor) -> bool {
        self.all.contains_key(&OrderKey::of(descriptor))
    }

    /// Descriptors matching `filter`, in lookup order
    ///
    /// The smallest index named by the filter's hints is scanned; without
    /// hints every descriptor is tested.
    pub fn matching(&self, filter: &dyn Filter) -> Vec<Arc<ActiveDescriptor>> {
        self.candidates(filter)
            .map(|entries| {
                entries
                    .values()
                    .filter(|descriptor| filter.matches(descriptor.descriptor()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Best descriptor matching `filter`
    pub fn best(&self, filter: &dyn Filter) -> Option<Arc<ActiveDescriptor>> {
        self.candidates(filter)?
            .values()
            .find(|descriptor| filter.matches(descriptor.descriptor()))
            .cloned()
    }

    /// Every descriptor in lookup order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ActiveDescriptor>> {
        self.all.values()
    }

    /// `None` when a hinted bucket is empty, so nothing can match
    fn candidates(&self, filter: &dyn Filter) -> Option<&Ordered> {
        let hinted = [
            filter
                .advertised_contract()
                .map(|contract| self.by_contract.get(contract)),
            filter.name().map(|name| self.by_name.get(name)),
            filter
                .qualifier_hint()
                .map(|qualifier| self.by_qualifier.get(qualifier)),
        ];
        let mut smallest: Option<&Ordered> = None;
        for hint in hinted.into_iter().flatten() {
            let entries = hint?;
            if smallest.is_none_or(|current| entries.len() < current.len()) {
                smallest = Some(entries);
            }
        }
        Some(smallest.unwrap_or(&self.all))
    }
}
