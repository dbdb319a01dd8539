//! Process-wide locator factory
//!
//! Keeps named service locators so that independent parts of a process can
//! share them. [`ServiceLocatorFactory::global`] is the instance most code
//! uses; tests create private factories with [`ServiceLocatorFactory::new`].

use locus_application::ServiceLocator;
use locus_domain::{Error, MultiResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::{debug, info};

static GLOBAL: LazyLock<ServiceLocatorFactory> = LazyLock::new(ServiceLocatorFactory::new);

/// What `create` does when the name is already taken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CreatePolicy {
    /// Return the existing locator
    Return,
    /// Destroy the existing locator and create a new one
    Destroy,
    /// Fail
    #[default]
    Error,
}

struct Entry {
    locator: ServiceLocator,
    parent: Option<String>,
}

/// Registry of named locators
#[derive(Default)]
pub struct ServiceLocatorFactory {
    locators: Mutex<HashMap<String, Entry>>,
}

impl ServiceLocatorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The factory shared by the whole process
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Create and register a locator called `name`
    ///
    /// When `parent` was itself created by this factory, destroying the
    /// parent later also removes the new locator.
    pub fn create(
        &self,
        name: &str,
        parent: Option<&ServiceLocator>,
        policy: CreatePolicy,
    ) -> MultiResult<ServiceLocator> {
        if name.is_empty() {
            return Err(Error::invalid_argument("locator name must not be empty").into());
        }
        loop {
            let mut locators = self.locators.lock();
            let Some(existing) = locators.get(name).map(|entry| entry.locator.clone()) else {
                return Ok(Self::insert(&mut locators, name, parent));
            };
            match policy {
                CreatePolicy::Return => return Ok(existing),
                CreatePolicy::Error => {
                    return Err(Error::illegal_state(format!(
                        "a service locator named '{name}' already exists"
                    ))
                    .into());
                }
                CreatePolicy::Destroy => {
                    let removed = Self::remove_tree(&mut locators, name);
                    // destruction hooks run without the lock held
                    drop(locators);
                    for (removed, locator) in removed {
                        locator.shutdown();
                        debug!(locator = %removed, "Service locator replaced");
                    }
                }
            }
        }
    }

    fn insert(
        locators: &mut HashMap<String, Entry>,
        name: &str,
        parent: Option<&ServiceLocator>,
    ) -> ServiceLocator {
        let locator = match parent {
            Some(parent) => ServiceLocator::with_parent(name, parent),
            None => ServiceLocator::new(name),
        };
        // only a parent registered here links the new locator into a tree
        let parent_name = parent
            .filter(|parent| {
                locators
                    .get(parent.name())
                    .is_some_and(|entry| entry.locator.id() == parent.id())
            })
            .map(|parent| parent.name().to_string());
        info!(locator = name, parent = ?parent_name, "Service locator created");
        locators.insert(
            name.to_string(),
            Entry {
                locator: locator.clone(),
                parent: parent_name,
            },
        );
        locator
    }

    /// Locator registered under `name`
    pub fn find(&self, name: &str) -> Option<ServiceLocator> {
        self.locators
            .lock()
            .get(name)
            .map(|entry| entry.locator.clone())
    }

    /// Shut down and forget `name` and every locator created below it
    ///
    /// Returns `false` when no locator has that name.
    pub fn destroy(&self, name: &str) -> bool {
        let removed = Self::remove_tree(&mut self.locators.lock(), name);
        if removed.is_empty() {
            return false;
        }
        for (removed, locator) in removed {
            locator.shutdown();
            info!(locator = %removed, "Service locator destroyed");
        }
        true
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.locators.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Detach `name` and its descendants, deepest first
    fn remove_tree(
        locators: &mut HashMap<String, Entry>,
        name: &str,
    ) -> Vec<(String, ServiceLocator)> {
        let Some(entry) = locators.remove(name) else {
            return Vec::new();
        };
        let children: Vec<String> = locators
            .iter()
            .filter(|(_, child)| child.parent.as_deref() == Some(name))
            .map(|(child, _)| child.clone())
            .collect();
        let mut removed = Vec::new();
        for child in children {
            removed.extend(Self::remove_tree(locators, &child));
        }
        removed.push((name.to_string(), entry.locator));
        removed
    }
}

impl std::fmt::Debug for ServiceLocatorFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceLocatorFactory")
            .field("locators", &self.names())
            .finish()
    }
}
