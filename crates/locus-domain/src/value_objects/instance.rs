//! Type-erased service instances

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Shared, type-erased service instance
///
/// Contexts cache instances and injection passes them around without
/// knowing their concrete type; callers recover it with [`Instance::downcast`].
#[derive(Clone)]
pub struct Instance(Arc<dyn Any + Send + Sync>);

impl Instance {
    /// Wrap a value
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Wrap an existing shared value without re-allocating
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self(value)
    }

    /// Recover the concrete type
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.0).downcast::<T>().ok()
    }

    /// Whether the value has type `T`
    pub fn is<T: Any + Send + Sync>(&self) -> bool {
        self.0.is::<T>()
    }

    /// Whether both handles point at the same allocation
    pub fn same_as(&self, other: &Instance) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance({:p})", Arc::as_ptr(&self.0).cast::<()>())
    }
}
