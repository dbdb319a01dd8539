//! Enterable scoped context
//!
//! A [`ScopedContext`] serves a custom scope that is active only between
//! [`ScopedContext::enter`] and the drop of the returned [`ScopeGuard`].
//! Each entry opens a fresh scope instance with its own instance cache;
//! leaving the scope destroys what it created, newest first. Scope
//! instances can be resumed on other threads while they are open.

use super::cache::{InstanceCache, destroy_logged};
use crate::ports::{Context, InstanceCreator};
use crate::registry::ActiveDescriptor;
use dashmap::DashMap;
use locus_domain::value_objects::Instance;
use locus_domain::{Error, MultiResult};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(1);
static NEXT_SCOPE_INSTANCE: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Open scope instances on this thread, per context, innermost last
    static ENTERED: RefCell<HashMap<u64, Vec<ScopeId>>> = RefCell::new(HashMap::new());
}

/// Identifier of one open scope instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Context for a custom, explicitly entered scope
pub struct ScopedContext {
    scope: String,
    context_id: u64,
    proxiable: bool,
    open: DashMap<ScopeId, Arc<InstanceCache>>,
}

impl ScopedContext {
    /// Proxiable context for `scope`
    pub fn new<S: Into<String>>(scope: S) -> Self {
        Self {
            scope: scope.into(),
            context_id: NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed),
            proxiable: true,
            open: DashMap::new(),
        }
    }

    /// Hand out direct instances instead of deferred handles
    pub fn without_proxies(mut self) -> Self {
        self.proxiable = false;
        self
    }

    /// Open a new scope instance on the current thread
    pub fn enter(self: &Arc<Self>) -> ScopeGuard {
        let id = ScopeId(NEXT_SCOPE_INSTANCE.fetch_add(1, Ordering::Relaxed));
        self.open.insert(id, Arc::new(InstanceCache::new()));
        self.push(id);
        debug!(scope = %self.scope, instance = %id, "Scope entered");
        ScopeGuard {
            context: Arc::clone(self),
            id,
            owner: true,
            _not_send: PhantomData,
        }
    }

    /// Make an open scope instance current on this thread as well
    ///
    /// The returned guard does not close the scope instance when dropped.
    pub fn resume(self: &Arc<Self>, id: ScopeId) -> MultiResult<ScopeGuard> {
        if !self.open.contains_key(&id) {
            return Err(Error::no_active_context(
                self.scope.as_str(),
                format!("scope instance {id} is not open"),
            )
            .into());
        }
        self.push(id);
        Ok(ScopeGuard {
            context: Arc::clone(self),
            id,
            owner: false,
            _not_send: PhantomData,
        })
    }

    /// Innermost scope instance current on this thread
    pub fn current(&self) -> Option<ScopeId> {
        ENTERED.with(|entered| {
            entered
                .borrow()
                .get(&self.context_id)
                .and_then(|stack| stack.last().copied())
        })
    }

    /// Number of open scope instances across all threads
    pub fn open_instances(&self) -> usize {
        self.open.len()
    }

    fn push(&self, id: ScopeId) {
        ENTERED.with(|entered| {
            entered
                .borrow_mut()
                .entry(self.context_id)
                .or_default()
                .push(id);
        });
    }

    fn pop(&self, id: ScopeId) {
        ENTERED.with(|entered| {
            let mut entered = entered.borrow_mut();
            if let Some(stack) = entered.get_mut(&self.context_id) {
                if let Some(position) = stack.iter().rposition(|entry| *entry == id) {
                    stack.remove(position);
                }
                if stack.is_empty() {
                    entered.remove(&self.context_id);
                }
            }
        });
    }

    fn close(&self, id: ScopeId) {
        if let Some((_, cache)) = self.open.remove(&id) {
            debug!(scope = %self.scope, instance = %id, live = cache.len(), "Scope closed");
            cache.destroy_all(&self.scope);
        }
    }

    fn current_cache(&self) -> Option<Arc<InstanceCache>> {
        let id = self.current()?;
        self.open.get(&id).map(|cache| Arc::clone(cache.value()))
    }
}

impl Context for ScopedContext {
    fn scope(&self) -> &str {
        &self.scope
    }

    fn find_or_create(
        &self,
        descriptor: &Arc<ActiveDescriptor>,
        creator: &dyn InstanceCreator,
    ) -> MultiResult<Instance> {
        let cache = self.current_cache().ok_or_else(|| {
            Error::no_active_context(
                self.scope.as_str(),
                format!("no scope instance is open on this thread for {descriptor}"),
            )
        })?;
        cache.find_or_create(descriptor, creator, None)
    }

    fn contains(&self, descriptor: &ActiveDescriptor) -> bool {
        self.current_cache()
            .is_some_and(|cache| cache.contains(descriptor))
    }

    fn is_active(&self) -> bool {
        self.current_cache().is_some()
    }

    fn proxiable(&self) -> bool {
        self.proxiable
    }

    fn destroy_one(&self, descriptor: &ActiveDescriptor) {
        for cache in self.open.iter() {
            if let Some(created) = cache.value().take(descriptor) {
                destroy_logged(&self.scope, &created);
            }
        }
    }

    fn shutdown(&self) {
        let ids: Vec<ScopeId> = self.open.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            self.close(id);
        }
    }
}

impl fmt::Debug for ScopedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedContext")
            .field("scope", &self.scope)
            .field("proxiable", &self.proxiable)
            .field("open", &self.open.len())
            .finish()
    }
}

/// Keeps a scope instance current on this thread until dropped
#[derive(Debug)]
pub struct ScopeGuard {
    context: Arc<ScopedContext>,
    id: ScopeId,
    owner: bool,
    _not_send: PhantomData<*const ()>,
}

impl ScopeGuard {
    /// The scope instance this guard keeps current
    pub fn id(&self) -> ScopeId {
        self.id
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.context.pop(self.id);
        if self.owner {
            self.context.close(self.id);
        }
    }
}
