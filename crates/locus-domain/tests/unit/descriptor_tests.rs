//! Unit tests for descriptors and the descriptor builder

use locus_domain::constants::{DEFAULT_RANK, DEFAULT_SCOPE, SINGLETON_SCOPE};
use locus_domain::value_objects::{Descriptor, DescriptorId, DescriptorType, contract_of};

trait Store {}

// =============================================================================
// Builder
// =============================================================================

/// Test builder defaults
#[test]
fn test_builder_defaults() {
    let descriptor = Descriptor::builder("app::Clock").build();

    assert_eq!(descriptor.implementation(), "app::Clock");
    assert_eq!(descriptor.scope(), DEFAULT_SCOPE);
    assert_eq!(descriptor.rank(), DEFAULT_RANK);
    assert_eq!(descriptor.name(), None);
    assert_eq!(descriptor.descriptor_type(), DescriptorType::Class);
    assert_eq!(descriptor.proxiable(), None);
    assert_eq!(descriptor.id(), None);
    assert!(descriptor.advertises("app::Clock"));
}

/// Test the implementation contract can be suppressed
#[test]
fn test_builder_without_implementation_contract() {
    let descriptor = Descriptor::builder("app::SqlStore")
        .to("app::Store")
        .without_implementation_contract()
        .build();

    assert!(descriptor.advertises("app::Store"));
    assert!(!descriptor.advertises("app::SqlStore"));
    assert_eq!(descriptor.contracts().len(), 1);
}

/// Test metadata is multi-valued and ordered by insertion
#[test]
fn test_builder_metadata_multi_valued() {
    let descriptor = Descriptor::builder("app::Pool")
        .has_metadata("hosts", "a")
        .has_metadata("hosts", "b")
        .has_metadata("size", "4")
        .build();

    assert_eq!(descriptor.metadata_values("hosts"), ["a", "b"]);
    assert_eq!(descriptor.metadata_value("size"), Some("4"));
    assert!(descriptor.metadata_values("missing").is_empty());
}

/// Test contracts derived from Rust types
#[test]
fn test_builder_to_type() {
    let descriptor = Descriptor::builder("app::SqlStore")
        .to_type::<dyn Store>()
        .build();

    assert!(descriptor.advertises(&contract_of::<dyn Store>()));
}

/// Test qualifier matching
#[test]
fn test_has_qualifiers() {
    let descriptor = Descriptor::builder("app::Cache")
        .qualified_by("fast")
        .qualified_by("local")
        .build();

    let fast = vec!["fast".to_string()];
    let both = vec!["fast".to_string(), "local".to_string()];
    let remote = vec!["remote".to_string()];
    assert!(descriptor.has_qualifiers(&fast));
    assert!(descriptor.has_qualifiers(&both));
    assert!(!descriptor.has_qualifiers(&remote));
    assert!(descriptor.has_qualifiers(&Vec::<String>::new()));
}

// =============================================================================
// Equality and identity
// =============================================================================

/// Test equality ignores the id and proxy preference
#[test]
fn test_equality_ignores_id_and_proxy() {
    let a = Descriptor::builder("app::Clock").in_scope(SINGLETON_SCOPE).build();
    let b = Descriptor::builder("app::Clock")
        .in_scope(SINGLETON_SCOPE)
        .proxy(true)
        .build()
        .with_id(DescriptorId {
            locator_id: 3,
            service_id: 9,
        });

    assert_eq!(a, b);
}

/// Test equality distinguishes rank, name and metadata
#[test]
fn test_equality_distinguishes_fields() {
    let base = Descriptor::builder("app::Clock").build();

    assert_ne!(base, base.clone().with_rank(5));
    assert_ne!(base, Descriptor::builder("app::Clock").named("utc").build());
    assert_ne!(
        base,
        Descriptor::builder("app::Clock").has_metadata("tz", "utc").build()
    );
}

/// Test display includes the name when present
#[test]
fn test_display() {
    let plain = Descriptor::builder("app::Clock").build();
    let named = Descriptor::builder("app::Clock").named("utc").build();

    assert_eq!(plain.to_string(), "app::Clock");
    assert_eq!(named.to_string(), "app::Clock(name=utc)");
}

/// Test descriptor ids order by locator then service id
#[test]
fn test_descriptor_id_order_and_display() {
    let first = DescriptorId {
        locator_id: 1,
        service_id: 7,
    };
    let second = DescriptorId {
        locator_id: 2,
        service_id: 0,
    };

    assert!(first < second);
    assert_eq!(first.to_string(), "1.7");
}

/// Test JSON serialization keeps the declarative fields
#[test]
fn test_serde_json() {
    let descriptor = Descriptor::builder("app::Clock")
        .named("utc")
        .ranked(3)
        .build();

    let json = serde_json::to_string(&descriptor).expect("serialize");
    let back: Descriptor = serde_json::from_str(&json).expect("deserialize");

    assert_eq!(back, descriptor);
    assert!(!json.contains("\"id\""));
}
