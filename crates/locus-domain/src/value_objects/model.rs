//! Implementation shape model
//!
//! Implementations describe their constructors, fields and methods with an
//! [`ImplementationModel`]. The reification engine validates the model and
//! derives the ordered injectee list from it; the implementation then
//! receives the resolved values as [`ResolvedArguments`].

use super::injectee::{Injectee, InjectionPoint, InjectionSite};
use super::instance::Instance;
use crate::error::{Error, Result};
use std::any::Any;
use std::sync::Arc;

/// A constructor of an implementation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructorModel {
    /// Marked for injection
    pub injectable: bool,
    /// Parameters in declaration order
    pub parameters: Vec<InjectionPoint>,
}

impl ConstructorModel {
    /// A constructor marked for injection
    pub fn injectable(parameters: Vec<InjectionPoint>) -> Self {
        Self {
            injectable: true,
            parameters,
        }
    }

    /// A constructor not marked for injection
    pub fn plain(parameters: Vec<InjectionPoint>) -> Self {
        Self {
            injectable: false,
            parameters,
        }
    }

    /// An unmarked zero-argument constructor
    pub fn zero_arg() -> Self {
        Self::plain(Vec::new())
    }
}

/// A field of an implementation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldModel {
    pub name: String,
    pub injectable: bool,
    pub is_static: bool,
    pub is_final: bool,
    pub point: InjectionPoint,
}

impl FieldModel {
    /// A field marked for injection
    pub fn injected<S: Into<String>>(name: S, point: InjectionPoint) -> Self {
        Self {
            name: name.into(),
            injectable: true,
            is_static: false,
            is_final: false,
            point,
        }
    }

    /// Declare the field static
    pub fn make_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Declare the field final
    pub fn make_final(mut self) -> Self {
        self.is_final = true;
        self
    }
}

/// A method of an implementation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodModel {
    pub name: String,
    pub injectable: bool,
    pub is_static: bool,
    pub is_abstract: bool,
    pub parameters: Vec<InjectionPoint>,
}

impl MethodModel {
    /// A method marked for injection
    pub fn injected<S: Into<String>>(name: S, parameters: Vec<InjectionPoint>) -> Self {
        Self {
            name: name.into(),
            injectable: true,
            is_static: false,
            is_abstract: false,
            parameters,
        }
    }

    /// Declare the method static
    pub fn make_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Declare the method abstract
    pub fn make_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }
}

/// Declared shape of an implementation
///
/// # Example
///
/// ```
/// use locus_domain::value_objects::{
///     ConstructorModel, FieldModel, ImplementationModel, InjectionPoint,
/// };
///
/// let model = ImplementationModel::new("app::Service")
///     .constructor(ConstructorModel::injectable(vec![InjectionPoint::of("app::Store")]))
///     .field(FieldModel::injected("clock", InjectionPoint::of("app::Clock").optional()));
///
/// assert_eq!(model.constructors.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImplementationModel {
    pub name: String,
    pub constructors: Vec<ConstructorModel>,
    pub fields: Vec<FieldModel>,
    pub methods: Vec<MethodModel>,
}

impl ImplementationModel {
    /// Empty model for an implementation
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            constructors: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Model with only an unmarked zero-argument constructor
    pub fn simple<S: Into<String>>(name: S) -> Self {
        Self::new(name).constructor(ConstructorModel::zero_arg())
    }

    /// Add a constructor
    pub fn constructor(mut self, constructor: ConstructorModel) -> Self {
        self.constructors.push(constructor);
        self
    }

    /// Add a field
    pub fn field(mut self, field: FieldModel) -> Self {
        self.fields.push(field);
        self
    }

    /// Add a method
    pub fn method(mut self, method: MethodModel) -> Self {
        self.methods.push(method);
        self
    }
}

// ============================================================================
// Resolved arguments
// ============================================================================

/// Value resolved for one injectee
#[derive(Debug, Clone)]
pub enum ResolvedValue {
    /// Single service, `None` for an unsatisfied optional point
    Single(Option<Instance>),
    /// Every matching service
    All(Vec<Instance>),
}

/// Values resolved for every injectee of an implementation
#[derive(Debug, Clone, Default)]
pub struct ResolvedArguments {
    entries: Vec<(Injectee, ResolvedValue)>,
}

impl ResolvedArguments {
    /// Empty argument set
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the value of an injectee
    pub fn push(&mut self, injectee: Injectee, value: ResolvedValue) {
        self.entries.push((injectee, value));
    }

    /// Number of resolved injectees
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was resolved
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate injectees with their values
    pub fn iter(&self) -> impl Iterator<Item = (&Injectee, &ResolvedValue)> {
        self.entries.iter().map(|(injectee, value)| (injectee, value))
    }

    /// Raw value at a site and position
    pub fn value(&self, site: &InjectionSite, position: usize) -> Option<&ResolvedValue> {
        self.entries
            .iter()
            .find(|(injectee, _)| injectee.site() == site && injectee.position() == position)
            .map(|(_, value)| value)
    }

    /// Single instance at a site and position
    pub fn instance(&self, site: &InjectionSite, position: usize) -> Option<&Instance> {
        match self.value(site, position) {
            Some(ResolvedValue::Single(instance)) => instance.as_ref(),
            _ => None,
        }
    }

    /// Every instance at a site and position
    pub fn all(&self, site: &InjectionSite, position: usize) -> Vec<Instance> {
        match self.value(site, position) {
            Some(ResolvedValue::All(instances)) => instances.clone(),
            Some(ResolvedValue::Single(Some(instance))) => vec![instance.clone()],
            _ => Vec::new(),
        }
    }

    /// Typed constructor argument
    pub fn constructor<T: Any + Send + Sync>(&self, position: usize) -> Result<Arc<T>> {
        self.typed(&InjectionSite::Constructor, position)
    }

    /// Typed constructor argument of an optional point
    pub fn optional_constructor<T: Any + Send + Sync>(&self, position: usize) -> Option<Arc<T>> {
        self.instance(&InjectionSite::Constructor, position)
            .and_then(Instance::downcast::<T>)
    }

    /// Typed field value
    pub fn field<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        self.typed(&InjectionSite::Field(name.to_string()), 0)
    }

    /// Typed method argument
    pub fn method<T: Any + Send + Sync>(&self, name: &str, position: usize) -> Result<Arc<T>> {
        self.typed(&InjectionSite::Method(name.to_string()), position)
    }

    fn typed<T: Any + Send + Sync>(&self, site: &InjectionSite, position: usize) -> Result<Arc<T>> {
        let instance = self.instance(site, position).ok_or_else(|| {
            Error::invalid_argument(format!("no value resolved for {site} parameter {position}"))
        })?;
        instance.downcast::<T>().ok_or_else(|| {
            Error::invalid_argument(format!(
                "value for {site} parameter {position} is not a {}",
                std::any::type_name::<T>()
            ))
        })
    }
}
