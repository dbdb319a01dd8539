//! Implementation model analysis
//!
//! Validates the declared shape of an implementation and derives its
//! injectees. Every rule is checked and every violation reported, so a
//! model with three problems yields three errors.

use locus_domain::value_objects::{
    ConstructorModel, ImplementationModel, Injectee, InjectionSite, ParentRef,
};
use locus_domain::{Error, MultiError, MultiResult};

/// Injectees of `model` in constructor, field, method order
pub fn analyze(model: &ImplementationModel, parent: &ParentRef) -> MultiResult<Vec<Injectee>> {
    let name = model.name.as_str();
    let mut errors = MultiError::new();
    let mut injectees = Vec::new();

    match select_constructor(model) {
        Ok(constructor) => {
            for (position, point) in constructor.parameters.iter().enumerate() {
                if point.marker_typed {
                    errors.push(Error::reification(
                        name,
                        format!("constructor parameter {position} of {name} is typed as a marker"),
                    ));
                }
                injectees.push(
                    Injectee::new(point.clone(), InjectionSite::Constructor, position)
                        .with_parent(parent.clone()),
                );
            }
        }
        Err(e) => errors.push(e),
    }

    for field in model.fields.iter().filter(|field| field.injectable) {
        let field_name = &field.name;
        if field.is_static {
            errors.push(Error::reification(
                name,
                format!("injected field {field_name} of {name} is static"),
            ));
        }
        if field.is_final {
            errors.push(Error::reification(
                name,
                format!("injected field {field_name} of {name} is final"),
            ));
        }
        if field.point.marker_typed {
            errors.push(Error::reification(
                name,
                format!("injected field {field_name} of {name} is typed as a marker"),
            ));
        }
        injectees.push(
            Injectee::new(field.point.clone(), InjectionSite::Field(field_name.clone()), 0)
                .with_parent(parent.clone()),
        );
    }

    for method in model.methods.iter().filter(|method| method.injectable) {
        let method_name = &method.name;
        if method.is_static {
            errors.push(Error::reification(
                name,
                format!("injected method {method_name} of {name} is static"),
            ));
        }
        if method.is_abstract {
            errors.push(Error::reification(
                name,
                format!("injected method {method_name} of {name} is abstract"),
            ));
        }
        for (position, point) in method.parameters.iter().enumerate() {
            if point.marker_typed {
                errors.push(Error::reification(
                    name,
                    format!(
                        "parameter {position} of injected method {method_name} of {name} is typed as a marker"
                    ),
                ));
            }
            injectees.push(
                Injectee::new(
                    point.clone(),
                    InjectionSite::Method(method_name.clone()),
                    position,
                )
                .with_parent(parent.clone()),
            );
        }
    }

    errors.into_result(injectees)
}

/// The constructor marked for injection, or the zero-argument one
fn select_constructor(model: &ImplementationModel) -> Result<&ConstructorModel, Error> {
    let name = model.name.as_str();
    let marked: Vec<&ConstructorModel> = model
        .constructors
        .iter()
        .filter(|constructor| constructor.injectable)
        .collect();
    match marked.as_slice() {
        [single] => Ok(single),
        [] => model
            .constructors
            .iter()
            .find(|constructor| constructor.parameters.is_empty())
            .ok_or_else(|| {
                Error::reification(
                    name,
                    format!(
                        "{name} has no constructor marked for injection and no zero-argument constructor"
                    ),
                )
            }),
        many => Err(Error::reification(
            name,
            format!(
                "more than one constructor of {name} is marked for injection ({} found)",
                many.len()
            ),
        )),
    }
}
