//! Built-in contexts
//!
//! | Scope | Context | Lifetime |
//! |-------|---------|----------|
//! | `Singleton` | [`SingletonContext`] | until the locator shuts down |
//! | `PerLookup` | [`PerLookupContext`] | owned by the requesting handle |
//! | `PerThread` | [`PerThreadContext`] | one per thread, until shutdown |
//! | custom | [`ScopedContext`] | between enter and leave |

pub mod cache;
pub mod per_lookup;
pub mod per_thread;
pub mod scoped;
pub mod singleton;

pub use cache::{InstanceCache, WaitObserver};
pub use per_lookup::PerLookupContext;
pub use per_thread::PerThreadContext;
pub use scoped::{ScopeGuard, ScopeId, ScopedContext};
pub use singleton::SingletonContext;
