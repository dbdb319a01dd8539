//! Unit tests for the descriptor registry and dynamic configuration
//!
//! Covers atomic commits, idempotent binds, unbind guards, validation,
//! lookup ordering and configuration listeners.

use crate::test_utils::{EventLog, bind_one, depending, name_of, simple};
use locus_application::ServiceLocator;
use locus_application::ports::{Operation, ValidationService};
use locus_application::contexts::SingletonContext;
use locus_domain::ErrorKind;
use locus_domain::constants::SINGLETON_SCOPE;
use locus_domain::filter;
use locus_domain::value_objects::{
    ConstructorModel, Descriptor, ImplementationModel, InjectionPoint, Instance,
};
use locus_domain::ports::ImplementationFn;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// Binding and commit
// =============================================================================

/// Test bound descriptors carry ids and only appear after commit
#[test]
fn test_bind_visible_only_after_commit() {
    let locator = ServiceLocator::new("registry");
    let mut config = locator.create_dynamic_configuration();
    let bound = config.bind_implementation(Descriptor::builder("app::A").build(), simple("app::A"));

    assert_eq!(bound.id().locator_id, locator.id());
    assert_eq!(bound.descriptor().id(), Some(bound.id()));
    assert!(
        locator
            .get_descriptors(&filter::contract("app::A"))
            .expect("lookup")
            .is_empty()
    );

    config.commit().expect("commit");
    let found = locator
        .get_descriptors(&filter::contract("app::A"))
        .expect("lookup");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id(), bound.id());
}

/// Test service ids are never reused, even for rejected batches
#[test]
fn test_service_ids_monotonic() {
    let locator = ServiceLocator::new("ids");
    let mut rejected = locator.create_dynamic_configuration();
    let first = rejected.bind_implementation(Descriptor::builder("app::A").build(), simple("app::A"));
    rejected.add_idempotent_filter(filter::all());
    drop(rejected);

    let second = bind_one(&locator, Descriptor::builder("app::A").build(), simple("app::A"));
    assert!(second.id().service_id > first.id().service_id);
}

/// Test an idempotent filter rejects a duplicate and leaves one descriptor
#[test]
fn test_idempotent_bind_rejects_duplicate() {
    let locator = ServiceLocator::new("idempotent");
    let descriptor = Descriptor::builder("app::A").in_scope(SINGLETON_SCOPE).build();
    bind_one(&locator, descriptor.clone(), simple("app::A"));

    let mut config = locator.create_dynamic_configuration();
    config.add_idempotent_filter(filter::equal_to(&descriptor));
    config.bind_implementation(descriptor, simple("app::A"));
    let errors = config.commit().expect_err("duplicate must be rejected");

    assert!(errors.has(ErrorKind::DuplicateService));
    assert_eq!(
        locator
            .get_descriptors(&filter::contract("app::A"))
            .expect("lookup")
            .len(),
        1
    );
}

/// Test a rejected batch publishes none of its binds
#[test]
fn test_commit_is_all_or_nothing() {
    let locator = ServiceLocator::new("atomic");
    let version = locator.version();
    let broken = ImplementationFn::new(
        ImplementationModel::new("app::Broken")
            .constructor(ConstructorModel::injectable(vec![]))
            .constructor(ConstructorModel::injectable(vec![InjectionPoint::of("x")])),
        |_| Ok(Instance::new(())),
    )
    .into_arc();

    let mut config = locator.create_dynamic_configuration();
    config.bind_implementation(Descriptor::builder("app::Good").build(), simple("app::Good"));
    config.bind_implementation(Descriptor::builder("app::Broken").build(), broken);
    let errors = config.commit().expect_err("broken model");

    assert!(errors.has(ErrorKind::Reification));
    assert!(
        locator
            .get_service("app::Good", &[])
            .expect("lookup")
            .is_none()
    );
    assert_eq!(locator.version(), version);
}

/// Test every violation in a batch is reported
#[test]
fn test_commit_reports_every_violation() {
    let locator = ServiceLocator::new("violations");
    bind_one(&locator, Descriptor::builder("app::A").build(), simple("app::A"));
    bind_one(&locator, Descriptor::builder("app::B").build(), simple("app::B"));

    let mut config = locator.create_dynamic_configuration();
    config.add_idempotent_filter(filter::contract("app::A"));
    config.add_idempotent_filter(filter::contract("app::B"));
    config.add_context(Arc::new(SingletonContext::new()));
    let errors = config.commit().expect_err("three violations");

    assert_eq!(errors.len(), 3);
    assert!(errors.has(ErrorKind::DuplicateService));
    assert!(errors.has(ErrorKind::IllegalState));
}

// =============================================================================
// Ordering
// =============================================================================

/// Test lookup order is rank descending, then bind order
#[test]
fn test_lookup_order_rank_then_bind_order() {
    let locator = ServiceLocator::new("order");
    let mut config = locator.create_dynamic_configuration();
    config.bind_implementation(
        Descriptor::builder("app::First").to("app::Plugin").build(),
        simple("app::First"),
    );
    config.bind_implementation(
        Descriptor::builder("app::Ranked").to("app::Plugin").ranked(5).build(),
        simple("app::Ranked"),
    );
    config.bind_implementation(
        Descriptor::builder("app::Second").to("app::Plugin").build(),
        simple("app::Second"),
    );
    config.commit().expect("commit");

    let names: Vec<String> = locator
        .get_all_services("app::Plugin", &[])
        .expect("all")
        .iter()
        .map(name_of)
        .collect();
    assert_eq!(names, ["app::Ranked", "app::First", "app::Second"]);

    let best = locator.get_service("app::Plugin", &[]).expect("best").expect("some");
    assert_eq!(name_of(&best), "app::Ranked");
}

/// Test qualifier and name lookups
#[test]
fn test_qualified_and_named_lookup() {
    let locator = ServiceLocator::new("qualified");
    let mut config = locator.create_dynamic_configuration();
    config.bind_implementation(
        Descriptor::builder("app::Memory").to("app::Cache").named("memory").build(),
        simple("app::Memory"),
    );
    config.bind_implementation(
        Descriptor::builder("app::Disk")
            .to("app::Cache")
            .named("disk")
            .qualified_by("durable")
            .build(),
        simple("app::Disk"),
    );
    config.commit().expect("commit");

    let durable = locator
        .get_service("app::Cache", &["durable"])
        .expect("lookup")
        .expect("some");
    assert_eq!(name_of(&durable), "app::Disk");

    let memory = locator
        .get_named_service("app::Cache", "memory")
        .expect("lookup")
        .expect("some");
    assert_eq!(name_of(&memory), "app::Memory");

    assert!(
        locator
            .get_service("app::Cache", &["volatile"])
            .expect("lookup")
            .is_none()
    );
}

// =============================================================================
// Unbind
// =============================================================================

/// Test unbind removes descriptors and destroys their instances
#[test]
fn test_unbind_destroys_instance() {
    let locator = ServiceLocator::new("unbind");
    let log = EventLog::default();
    bind_one(
        &locator,
        Descriptor::builder("app::A").in_scope(SINGLETON_SCOPE).build(),
        depending("app::A", &[], &log),
    );
    locator.get_service("app::A", &[]).expect("lookup").expect("some");

    let mut config = locator.create_dynamic_configuration();
    config.unbind(filter::contract("app::A"));
    config.commit().expect("commit");

    assert!(locator.get_service("app::A", &[]).expect("lookup").is_none());
    assert_eq!(log.events(), ["new app::A", "destroy app::A"]);
}

/// Test an unbind filter forbids removal and aborts the batch
#[test]
fn test_unbind_filter_forbids_removal() {
    let locator = ServiceLocator::new("guard");
    bind_one(&locator, Descriptor::builder("app::A").build(), simple("app::A"));
    bind_one(&locator, Descriptor::builder("app::B").build(), simple("app::B"));

    let mut config = locator.create_dynamic_configuration();
    config.add_unbind_filter(filter::contract("app::A"));
    config.unbind(filter::all());
    let errors = config.commit().expect_err("guarded");

    assert!(errors.has(ErrorKind::UnbindForbidden));
    assert_eq!(locator.get_descriptors(&filter::all()).expect("lookup").len(), 2);
}

// =============================================================================
// Validation and listeners
// =============================================================================

struct DenyImplementation(&'static str);

impl ValidationService for DenyImplementation {
    fn name(&self) -> &str {
        "deny"
    }

    fn validate(&self, operation: Operation, descriptor: &Descriptor) -> bool {
        !(operation != Operation::Unbind && descriptor.implementation() == self.0)
    }
}

/// Test validation services veto binds
#[test]
fn test_validation_rejects_bind() {
    let locator = ServiceLocator::new("validation");
    let mut setup = locator.create_dynamic_configuration();
    setup.add_validation_service(Arc::new(DenyImplementation("app::Secret")));
    setup.commit().expect("commit");

    let mut config = locator.create_dynamic_configuration();
    config.bind_implementation(Descriptor::builder("app::Secret").build(), simple("app::Secret"));
    let errors = config.commit().expect_err("vetoed");

    assert!(errors.has(ErrorKind::ValidationFailure));
    assert!(errors.to_string().contains("deny"));
}

/// Test validation services hide descriptors from lookups
#[test]
fn test_validation_filters_lookup() {
    let locator = ServiceLocator::new("hidden");
    bind_one(&locator, Descriptor::builder("app::Secret").build(), simple("app::Secret"));

    let mut config = locator.create_dynamic_configuration();
    config.add_validation_service(Arc::new(DenyImplementation("app::Secret")));
    config.commit().expect("commit");

    assert!(locator.get_service("app::Secret", &[]).expect("lookup").is_none());
}

/// Test listeners see every committed version
#[test]
fn test_configuration_listener_notified() {
    let locator = ServiceLocator::new("listener");
    let seen = Arc::new(AtomicU64::new(0));
    let recorder = Arc::clone(&seen);
    locator.add_configuration_listener(Arc::new(move |version: u64| {
        recorder.store(version, Ordering::SeqCst);
    }));

    bind_one(&locator, Descriptor::builder("app::A").build(), simple("app::A"));
    bind_one(&locator, Descriptor::builder("app::B").build(), simple("app::B"));

    assert_eq!(seen.load(Ordering::SeqCst), locator.version());
    assert_eq!(locator.version(), 2);
}
