//! Circular dependency detection
//!
//! Two detectors cooperate. [`CreationStack`] is a per-thread stack of the
//! descriptors currently under construction; revisiting one is a cycle on
//! that thread. [`WaitGraph`] records which thread waits for which other
//! thread's in-flight construction, so a cycle that spans threads is
//! reported instead of deadlocking both.

use crate::registry::ActiveDescriptor;
use locus_domain::Error;
use locus_domain::value_objects::DescriptorId;
use parking_lot::Mutex;
use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::LazyLock;
use std::thread::{self, ThreadId};

// ============================================================================
// Per-thread creation stack
// ============================================================================

thread_local! {
    static CREATING: RefCell<Vec<(DescriptorId, String)>> = const { RefCell::new(Vec::new()) };
}

/// Descriptors under construction on the current thread
pub struct CreationStack;

impl CreationStack {
    /// Push `descriptor`, failing if it is already being built on this thread
    pub fn enter(descriptor: &ActiveDescriptor) -> Result<CreationGuard, Error> {
        let id = descriptor.id();
        CREATING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.iter().any(|(entry, _)| *entry == id) {
                return Err(Self::cycle_in(&stack, descriptor));
            }
            stack.push((id, descriptor.to_string()));
            Ok(CreationGuard {
                id,
                _not_send: PhantomData,
            })
        })
    }

    /// Cycle error for a descriptor this thread is already building
    pub fn cycle_error(descriptor: &ActiveDescriptor) -> Error {
        CREATING.with(|stack| Self::cycle_in(&stack.borrow(), descriptor))
    }

    /// Number of constructions in progress on this thread
    pub fn depth() -> usize {
        CREATING.with(|stack| stack.borrow().len())
    }

    fn cycle_in(stack: &[(DescriptorId, String)], descriptor: &ActiveDescriptor) -> Error {
        let id = descriptor.id();
        let start = stack
            .iter()
            .position(|(entry, _)| *entry == id)
            .unwrap_or(stack.len());
        let mut participants: Vec<String> =
            stack[start..].iter().map(|(_, name)| name.clone()).collect();
        participants.push(descriptor.to_string());
        Error::CircularDependency { participants }
    }
}

/// Pops the creation stack when dropped
pub struct CreationGuard {
    id: DescriptorId,
    _not_send: PhantomData<*const ()>,
}

impl Drop for CreationGuard {
    fn drop(&mut self) {
        CREATING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(position) = stack.iter().rposition(|(entry, _)| *entry == self.id) {
                stack.truncate(position);
            }
        });
    }
}

// ============================================================================
// Cross-thread wait-for graph
// ============================================================================

struct WaitEdge {
    owner: ThreadId,
    descriptor: String,
}

static WAITING: LazyLock<Mutex<HashMap<ThreadId, WaitEdge>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Process-wide record of threads blocked on another thread's construction
pub struct WaitGraph;

impl WaitGraph {
    /// Record that the current thread is about to wait for `owner` to finish
    /// building `descriptor`
    ///
    /// Fails with a circular dependency when `owner` is already waiting,
    /// directly or through other threads, on the current thread.
    pub fn register(owner: ThreadId, descriptor: &ActiveDescriptor) -> Result<WaitRegistration, Error> {
        let waiter = thread::current().id();
        let mut waiting = WAITING.lock();
        let mut participants = vec![descriptor.to_string()];
        let mut current = owner;
        for _ in 0..=waiting.len() {
            if current == waiter {
                participants.push(descriptor.to_string());
                return Err(Error::CircularDependency { participants });
            }
            match waiting.get(&current) {
                Some(edge) => {
                    participants.push(edge.descriptor.clone());
                    current = edge.owner;
                }
                None => break,
            }
        }
        waiting.insert(
            waiter,
            WaitEdge {
                owner,
                descriptor: descriptor.to_string(),
            },
        );
        Ok(WaitRegistration { waiter })
    }

    /// Number of threads currently blocked on another thread
    pub fn waiting_threads() -> usize {
        WAITING.lock().len()
    }
}

/// Removes the wait edge when dropped
pub struct WaitRegistration {
    waiter: ThreadId,
}

impl Drop for WaitRegistration {
    fn drop(&mut self) {
        WAITING.lock().remove(&self.waiter);
    }
}
