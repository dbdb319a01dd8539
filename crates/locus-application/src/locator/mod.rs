//! Service locator, handles and deferred services

mod creator;
pub mod deferred;
pub mod handle;
pub mod service_locator;

pub use deferred::Deferred;
pub use handle::ServiceHandle;
pub use service_locator::ServiceLocator;
