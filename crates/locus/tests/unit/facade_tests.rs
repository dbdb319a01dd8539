//! Unit tests for the facade re-exports

use locus::infrastructure::format::{parse_line, to_line};
use locus::{Descriptor, DynamicConfiguration, ServiceLocator, ServiceLocatorFactory};

/// Test the layers are reachable through the facade
#[test]
fn test_facade_binds_and_finds() {
    let locator = ServiceLocator::new("facade");
    let mut dynamic: DynamicConfiguration = locator.create_dynamic_configuration();
    dynamic.bind(Descriptor::builder("app::Clock").build());
    dynamic.commit().expect("commit");

    let found = locator
        .get_descriptors(&locus::domain::filter::contract("app::Clock"))
        .expect("lookup");
    assert_eq!(found.len(), 1);
    locator.shutdown();
}

/// Test a descriptor written by the facade parses back
#[test]
fn test_facade_format() {
    let descriptor = Descriptor::builder("app::Clock").to("app::Time").build();
    let parsed = parse_line(&to_line(&descriptor), 1)
        .expect("parse")
        .expect("descriptor");
    assert_eq!(parsed, descriptor);
}

/// Test the global factory is shared
#[test]
fn test_facade_global_factory() {
    assert!(std::ptr::eq(
        ServiceLocatorFactory::global(),
        locus::infrastructure::ServiceLocatorFactory::global()
    ));
}
