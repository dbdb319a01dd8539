//! Value objects
//!
//! Immutable data describing bindable units and what they need.

pub mod descriptor;
pub mod filter;
pub mod injectee;
pub mod instance;
pub mod model;

pub use descriptor::{Descriptor, DescriptorBuilder, DescriptorId, DescriptorType, contract_of};
pub use filter::Filter;
pub use injectee::{
    Injectee, InjecteeKey, InjectionKind, InjectionPoint, InjectionSite, ParentRef,
};
pub use instance::Instance;
pub use model::{
    ConstructorModel, FieldModel, ImplementationModel, MethodModel, ResolvedArguments,
    ResolvedValue,
};
