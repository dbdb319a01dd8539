//! Unit tests for the descriptor interchange format

use locus_domain::Error;
use locus_domain::value_objects::{Descriptor, DescriptorType};
use locus_infrastructure::format::{
    parse_document, parse_line, read_file, to_document, to_line, write_file,
};
use tempfile::TempDir;

fn store() -> Descriptor {
    Descriptor::builder("app::SqlStore")
        .to("app::Store")
        .named("primary")
        .in_scope("Singleton")
        .qualified_by("fast")
        .ranked(10)
        .has_metadata("pool", "8")
        .build()
}

fn parse_ok(line: &str) -> Descriptor {
    parse_line(line, 1).expect("parse").expect("descriptor")
}

fn parse_lines(errors: &locus_domain::MultiError) -> Vec<usize> {
    errors
        .errors()
        .iter()
        .map(|e| match e {
            Error::Parse { line, .. } => *line,
            other => panic!("unexpected error {other}"),
        })
        .collect()
}

// =============================================================================
// Writing
// =============================================================================

/// Test the written form of a typical descriptor
#[test]
fn test_to_line_layout() {
    assert_eq!(
        to_line(&store()),
        "class=app::SqlStore,index=app::SqlStore:primary,index=app::Store:primary,\
         name=primary,scope=Singleton,qualifier=fast,rank=10,pool=8"
    );
}

/// Test defaults are left out
#[test]
fn test_to_line_omits_defaults() {
    let plain = Descriptor::builder("app::Clock").build();
    assert_eq!(to_line(&plain), "class=app::Clock,index=app::Clock");
}

/// Test a document has one line per descriptor
#[test]
fn test_to_document_lines() {
    let clock = Descriptor::builder("app::Clock").build();
    let document = to_document([&store(), &clock]);

    assert_eq!(document.lines().count(), 2);
    assert!(document.ends_with('\n'));
    assert_eq!(parse_document(&document).expect("parse"), vec![store(), clock]);
}

// =============================================================================
// Round trips
// =============================================================================

/// Test a typical descriptor survives a round trip
#[test]
fn test_round_trip_typical_descriptor() {
    let original = store();
    let parsed = parse_ok(&to_line(&original));

    assert_eq!(parsed, original);
    assert_eq!(parsed.name(), Some("primary"));
    assert_eq!(parsed.rank(), 10);
}

/// Test separators, reserved metadata keys and odd contracts survive
#[test]
fn test_round_trip_escaped_content() {
    let original = Descriptor::builder("app::Impl")
        .without_implementation_contract()
        .to("a:b")
        .to("weird::")
        .to("::rooted::Path")
        .named("x:y,z")
        .in_scope("Request")
        .qualified_by("q=1")
        .has_metadata("name", "shadowed")
        .has_metadata("@odd", "at")
        .has_metadata("text", "a,b=c\nd\\e")
        .has_metadata("text", "second")
        .proxy(false)
        .provide_method()
        .ranked(-3)
        .build();

    let parsed = parse_ok(&to_line(&original));

    assert_eq!(parsed, original);
    assert!(!parsed.advertises("app::Impl"));
    assert_eq!(parsed.metadata_values("text"), ["a,b=c\nd\\e", "second"]);
    assert_eq!(parsed.metadata_value("name"), Some("shadowed"));
    assert_eq!(parsed.proxiable(), Some(false));
    assert_eq!(parsed.descriptor_type(), DescriptorType::ProvideMethod);
}

/// Test a carriage return inside a value is escaped rather than stripped
#[test]
fn test_round_trip_carriage_return() {
    let original = Descriptor::builder("app::Impl")
        .has_metadata("note", "v\r")
        .has_metadata("crlf", "a\r\nb")
        .build();

    let line = to_line(&original);

    assert!(line.contains("note=v\\r"));
    assert!(!line.contains('\r'));
    let parsed = parse_ok(&line);
    assert_eq!(parsed, original);
    assert_eq!(parsed.metadata_value("note"), Some("v\r"));
    assert_eq!(parsed.metadata_value("crlf"), Some("a\r\nb"));
}

// =============================================================================
// Parsing
// =============================================================================

/// Test a hand-written line without the implementation contract
#[test]
fn test_parse_without_implementation_index() {
    let parsed = parse_ok("class=app::FileStore,index=app::Store,rank=2,tier=cold,tier=archive");

    assert!(parsed.advertises("app::Store"));
    assert!(!parsed.advertises("app::FileStore"));
    assert_eq!(parsed.contracts().len(), 1);
    assert_eq!(parsed.metadata_values("tier"), ["cold", "archive"]);
    assert_eq!(parsed.descriptor_type(), DescriptorType::Class);
}

/// Test a line without any index advertises its implementation
#[test]
fn test_parse_without_index_advertises_implementation() {
    let parsed = parse_ok("class=app::Clock");
    assert_eq!(parsed, Descriptor::builder("app::Clock").build());
}

/// Test the index name alone names the descriptor
#[test]
fn test_parse_name_from_index() {
    let parsed = parse_ok("class=app::Store,index=app::Store:main");
    assert_eq!(parsed.name(), Some("main"));
}

/// Test comments and blank lines are skipped
#[test]
fn test_comments_and_blank_lines_skipped() {
    assert!(parse_line("# class=app::Ignored", 1).expect("comment").is_none());
    assert!(parse_line("   ", 2).expect("blank").is_none());
    assert!(parse_line("\r", 3).expect("carriage return").is_none());

    let document = "# services\n\nclass=app::A\n  # indented comment\nclass=app::B\r\n";
    let parsed = parse_document(document).expect("parse");
    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed[1].implementation(), "app::B");
}

/// Test every bad line is reported with its number
#[test]
fn test_parse_errors_report_line_numbers() {
    let document = "class=app::A\n# fine\nindex=app::B\nclass=app::C,rank=high\nclass=app::D\n";

    let errors = parse_document(document).expect_err("malformed");

    assert_eq!(parse_lines(&errors), [3, 4]);
    assert!(errors.to_string().contains("missing class"));
    assert!(errors.to_string().contains("rank 'high'"));
}

/// Test malformed lines are rejected
#[test]
fn test_malformed_lines_rejected() {
    let cases = [
        "class=app::A,rank",
        "class=app::A,class=app::B",
        "class=app::A,proxy=maybe",
        "class=app::A,type=method",
        "class=app::A\\q",
        "class=app::A\\",
        "class=app::A,name=one,index=app::A:two",
        "class=app::A,index=:name",
        "class=",
    ];
    for (number, line) in cases.iter().enumerate() {
        let error = parse_line(line, number + 1).expect_err(line);
        assert!(
            matches!(error, Error::Parse { line, .. } if line == number + 1),
            "{line}: {error}"
        );
    }
}

// =============================================================================
// Files
// =============================================================================

/// Test descriptors written to a file read back equal
#[test]
fn test_file_round_trip() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("services.locus");
    let descriptors = vec![store(), Descriptor::builder("app::Clock").build()];

    write_file(&path, &descriptors).expect("write");

    assert_eq!(read_file(&path).expect("read"), descriptors);
}

/// Test file errors name the file
#[test]
fn test_read_file_errors_name_the_file() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("broken.locus");
    std::fs::write(&path, "class=app::A\nrank=1\n").expect("write");

    let errors = read_file(&path).expect_err("malformed");
    assert_eq!(parse_lines(&errors), [2]);
    assert!(errors.to_string().contains("broken.locus"));

    let missing = read_file(dir.path().join("absent.locus")).expect_err("missing");
    assert!(missing.has(locus_domain::ErrorKind::Io));
}
