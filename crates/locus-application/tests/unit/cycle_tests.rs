//! Unit tests for circular dependency detection
//!
//! Same-thread cycles are caught by the creation stack; cycles spanning
//! threads are caught by the wait graph instead of deadlocking.

use crate::test_utils::{EventLog, depending};
use locus_application::ServiceLocator;
use locus_application::reification::{CreationStack, WaitGraph};
use locus_domain::{ErrorKind, MultiResult};
use locus_domain::constants::{PER_LOOKUP_SCOPE, SINGLETON_SCOPE};
use locus_domain::value_objects::{Descriptor, Instance};
use std::sync::{Arc, Barrier};
use std::thread;

fn bind_pair(locator: &ServiceLocator, scope: &str, log: &EventLog) {
    let mut config = locator.create_dynamic_configuration();
    config.bind_implementation(
        Descriptor::builder("app::A").in_scope(scope).build(),
        depending("app::A", &["app::B"], log),
    );
    config.bind_implementation(
        Descriptor::builder("app::B").in_scope(scope).build(),
        depending("app::B", &["app::A"], log),
    );
    config.commit().expect("commit");
}

// =============================================================================
// Same-thread cycles
// =============================================================================

/// Test two singletons depending on each other fail with both names
#[test]
fn test_singleton_cycle_detected() {
    let locator = ServiceLocator::new("singleton-cycle");
    let log = EventLog::default();
    bind_pair(&locator, SINGLETON_SCOPE, &log);

    let errors = locator.get_service("app::A", &[]).expect_err("cycle");

    assert!(errors.has(ErrorKind::CircularDependency));
    let message = errors.to_string();
    assert!(message.contains("app::A -> app::B -> app::A"), "{message}");
    assert!(log.events().is_empty());
    assert_eq!(CreationStack::depth(), 0);
}

/// Test per-lookup cycles are detected rather than recursing forever
#[test]
fn test_per_lookup_cycle_detected() {
    let locator = ServiceLocator::new("per-lookup-cycle");
    let log = EventLog::default();
    bind_pair(&locator, PER_LOOKUP_SCOPE, &log);

    let errors = locator.get_service("app::B", &[]).expect_err("cycle");

    assert!(errors.has(ErrorKind::CircularDependency));
    assert!(errors.to_string().contains("app::B -> app::A -> app::B"));
}

/// Test a failed cycle leaves the locator usable once the cycle is broken
#[test]
fn test_cycle_recovers_after_unbind() {
    let locator = ServiceLocator::new("cycle-recovery");
    let log = EventLog::default();
    bind_pair(&locator, SINGLETON_SCOPE, &log);
    assert!(locator.get_service("app::A", &[]).is_err());

    let mut config = locator.create_dynamic_configuration();
    config.unbind(locus_domain::filter::contract("app::B"));
    config.bind_implementation(
        Descriptor::builder("app::B").in_scope(SINGLETON_SCOPE).build(),
        depending("app::B", &[], &log),
    );
    config.commit().expect("commit");

    assert!(locator.get_service("app::A", &[]).expect("lookup").is_some());
    assert_eq!(log.events(), ["new app::B", "new app::A"]);
}

// =============================================================================
// Cross-thread cycles
// =============================================================================

/// Test two threads each building a singleton the other needs both fail
/// instead of deadlocking
#[test]
fn test_cross_thread_cycle_detected() {
    let locator = ServiceLocator::new("cross-thread");
    let barrier = Arc::new(Barrier::new(2));
    let mut config = locator.create_dynamic_configuration();
    for (own, other) in [("app::X", "app::Y"), ("app::Y", "app::X")] {
        let gate = Arc::clone(&barrier);
        config.bind_factory(
            Descriptor::builder(own)
                .in_scope(SINGLETON_SCOPE)
                .provide_method()
                .build(),
            Arc::new(move |locator: &ServiceLocator| -> MultiResult<Instance> {
                gate.wait();
                locator.get_service(other, &[])?;
                Ok(Instance::new(()))
            }),
        );
    }
    config.commit().expect("commit");

    let outcomes = thread::scope(|scope| {
        let x = scope.spawn(|| locator.get_service("app::X", &[]));
        let y = scope.spawn(|| locator.get_service("app::Y", &[]));
        [x.join().expect("join"), y.join().expect("join")]
    });

    for outcome in outcomes {
        let errors = outcome.expect_err("cycle");
        assert!(errors.has(ErrorKind::CircularDependency), "{errors}");
    }
    assert_eq!(WaitGraph::waiting_threads(), 0);
}
