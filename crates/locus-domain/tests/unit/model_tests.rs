//! Unit tests for implementation models, injectees and resolved arguments

use locus_domain::value_objects::{
    ConstructorModel, FieldModel, ImplementationModel, Injectee, InjectionKind, InjectionPoint,
    InjectionSite, Instance, ParentRef, ResolvedArguments, ResolvedValue,
};

fn parent() -> ParentRef {
    ParentRef {
        id: None,
        implementation: "app::Service".into(),
    }
}

/// Test injection point builders
#[test]
fn test_injection_point_builders() {
    let point = InjectionPoint::of("app::Store")
        .qualified_by("durable")
        .optional()
        .all();

    assert_eq!(point.contract, "app::Store");
    assert!(point.optional);
    assert_eq!(point.kind, InjectionKind::AllServices);
    assert!(point.qualifiers.contains("durable"));
    assert!(InjectionPoint::self_descriptor().is_self);
}

/// Test simple models carry a zero-argument constructor
#[test]
fn test_simple_model() {
    let model = ImplementationModel::simple("app::Clock");

    assert_eq!(model.constructors, vec![ConstructorModel::zero_arg()]);
    assert!(model.fields.is_empty());
}

/// Test injectee display names owner, site and contract
#[test]
fn test_injectee_display() {
    let injectee = Injectee::new(
        InjectionPoint::of("app::Store").qualified_by("durable"),
        InjectionSite::Constructor,
        1,
    )
    .with_parent(parent());

    assert_eq!(
        injectee.to_string(),
        "constructor parameter 1 of app::Service requiring app::Store qualified by [durable]"
    );
}

/// Test structural keys ignore the owner's id
#[test]
fn test_injectee_key_ignores_parent_id() {
    let point = InjectionPoint::of("app::Store");
    let unbound = Injectee::new(point.clone(), InjectionSite::Constructor, 0).with_parent(parent());
    let bound = Injectee::new(point, InjectionSite::Constructor, 0).with_parent(ParentRef {
        id: Some(locus_domain::value_objects::DescriptorId {
            locator_id: 1,
            service_id: 2,
        }),
        implementation: "app::Service".into(),
    });

    assert_eq!(unbound.key(), bound.key());
}

/// Test typed access to resolved arguments
#[test]
fn test_resolved_arguments_typed_access() {
    let mut arguments = ResolvedArguments::new();
    arguments.push(
        Injectee::new(InjectionPoint::of("u32"), InjectionSite::Constructor, 0),
        ResolvedValue::Single(Some(Instance::new(7_u32))),
    );
    arguments.push(
        Injectee::new(
            InjectionPoint::of("String"),
            InjectionSite::Field("label".into()),
            0,
        ),
        ResolvedValue::Single(Some(Instance::new(String::from("x")))),
    );
    arguments.push(
        Injectee::new(InjectionPoint::of("u8").optional(), InjectionSite::Constructor, 1),
        ResolvedValue::Single(None),
    );

    assert_eq!(*arguments.constructor::<u32>(0).expect("u32"), 7);
    assert_eq!(*arguments.field::<String>("label").expect("label"), "x");
    assert!(arguments.optional_constructor::<u8>(1).is_none());
    assert!(arguments.constructor::<String>(0).is_err());
    assert!(arguments.constructor::<u32>(5).is_err());
}

/// Test all-services values
#[test]
fn test_resolved_arguments_all() {
    let mut arguments = ResolvedArguments::new();
    arguments.push(
        Injectee::new(
            InjectionPoint::of("u32").all(),
            InjectionSite::Method("init".into()),
            0,
        ),
        ResolvedValue::All(vec![Instance::new(1_u32), Instance::new(2_u32)]),
    );

    let values = arguments.all(&InjectionSite::Method("init".into()), 0);
    assert_eq!(values.len(), 2);
    assert_eq!(arguments.len(), 1);
}

/// Test field model modifiers
#[test]
fn test_field_model_modifiers() {
    let field = FieldModel::injected("store", InjectionPoint::of("app::Store"))
        .make_static()
        .make_final();

    assert!(field.is_static);
    assert!(field.is_final);
    assert!(field.injectable);
}
