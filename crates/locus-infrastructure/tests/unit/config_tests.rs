//! Configuration loader tests
//!
//! Tests that set environment variables are ignored by default and must run
//! sequentially:
//!
//! ```bash
//! cargo test -p locus-infrastructure --test unit config -- --test-threads=1 --ignored
//! ```

use locus_domain::{Error, ErrorKind};
use locus_infrastructure::config::loader::validate_config;
use locus_infrastructure::config::{
    ConfigBuilder, ConfigLoader, LocusConfig, LoggingConfig, PopulatorConfig, RunLevelConfig,
};
use locus_infrastructure::constants::{DEFAULT_LOCATOR_NAME, DEFAULT_MAX_THREADS};
use locus_infrastructure::factory::CreatePolicy;
use locus_infrastructure::run_level::{RunLevelMode, ThreadingPolicy};
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

fn set_env(key: &str, value: &str) {
    // SAFETY: Tests must run with --test-threads=1
    unsafe {
        env::set_var(key, value);
    }
}

fn remove_env(key: &str) {
    // SAFETY: Tests must run with --test-threads=1
    unsafe {
        env::remove_var(key);
    }
}

fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("locus.toml");
    std::fs::write(&path, content).expect("write config");
    path
}

// =============================================================================
// Defaults
// =============================================================================

#[test]
fn test_default_config() {
    let config = LocusConfig::default();
    assert_eq!(config.locator.name, DEFAULT_LOCATOR_NAME);
    assert_eq!(config.locator.create_policy, CreatePolicy::Error);
    assert_eq!(config.run_level.max_threads, DEFAULT_MAX_THREADS);
    assert_eq!(config.run_level.threading_policy, ThreadingPolicy::FullyThreaded);
    assert_eq!(config.run_level.default_mode, RunLevelMode::Validating);
    assert!(config.populator.files.is_empty());
    assert!(validate_config(&config).is_ok());
}

/// Test a missing explicit file falls back to defaults
#[test]
fn test_missing_file_uses_defaults() {
    let dir = TempDir::new().expect("temp dir");
    let config = ConfigLoader::new()
        .with_config_path(dir.path().join("absent.toml"))
        .with_env_prefix("LOCUS_TEST_ABSENT")
        .load()
        .expect("load");
    assert_eq!(config, LocusConfig::default());
}

// =============================================================================
// TOML files
// =============================================================================

/// Test every section is read from TOML
#[test]
fn test_load_from_toml() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_config(
        &dir,
        r#"
[locator]
name = "app"
parent = "platform"
create_policy = "return"

[run_level]
max_threads = 2
threading_policy = "use-no-threads"
default_mode = "on-demand"
transition_timeout_secs = 30

[populator]
files = ["services.locus"]
directories = ["descriptors"]

[logging]
level = "debug"
json_format = true
"#,
    );

    let loader = ConfigLoader::new()
        .with_config_path(&path)
        .with_env_prefix("LOCUS_TEST_TOML");
    let config = loader.load().expect("load");

    assert_eq!(loader.config_path(), Some(path.as_path()));
    assert_eq!(config.locator.name, "app");
    assert_eq!(config.locator.parent.as_deref(), Some("platform"));
    assert_eq!(config.locator.create_policy, CreatePolicy::Return);
    assert_eq!(config.run_level.max_threads, 2);
    assert_eq!(config.run_level.threading_policy, ThreadingPolicy::UseNoThreads);
    assert_eq!(config.run_level.default_mode, RunLevelMode::OnDemand);
    assert_eq!(config.run_level.transition_timeout_secs, Some(30));
    assert_eq!(config.populator.files, [PathBuf::from("services.locus")]);
    assert_eq!(config.populator.directories, [PathBuf::from("descriptors")]);
    assert_eq!(config.logging.level, "debug");
    assert!(config.logging.json_format);
}

/// Test invalid values fail validation on load
#[test]
fn test_load_rejects_invalid_values() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_config(&dir, "[run_level]\nmax_threads = 0\n");

    let error = ConfigLoader::new()
        .with_config_path(&path)
        .with_env_prefix("LOCUS_TEST_INVALID")
        .load()
        .expect_err("invalid");
    assert_eq!(error.kind(), ErrorKind::Configuration);
}

/// Test malformed TOML is a configuration error
#[test]
fn test_load_rejects_malformed_toml() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_config(&dir, "[run_level]\nmax_threads = \"many\"\n");

    let result = ConfigLoader::new()
        .with_config_path(&path)
        .with_env_prefix("LOCUS_TEST_MALFORMED")
        .load();
    assert!(matches!(result, Err(Error::Configuration { .. })));
}

/// Test a saved configuration loads back unchanged
#[test]
fn test_save_and_reload() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("saved.toml");
    let config = ConfigBuilder::new()
        .with_locator_name("saved")
        .with_run_level(RunLevelConfig {
            max_threads: 8,
            ..RunLevelConfig::default()
        })
        .with_populator(PopulatorConfig {
            files: vec![PathBuf::from("a.locus")],
            directories: Vec::new(),
        })
        .with_logging(LoggingConfig {
            level: "warn".to_string(),
            ..LoggingConfig::default()
        })
        .build();

    let loader = ConfigLoader::new()
        .with_config_path(&path)
        .with_env_prefix("LOCUS_TEST_SAVE");
    loader.save_to_file(&config, &path).expect("save");

    assert_eq!(loader.load().expect("reload"), config);
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_validation_rules() {
    let mut empty_name = LocusConfig::default();
    empty_name.locator.name = "  ".to_string();
    assert!(validate_config(&empty_name).is_err());

    let mut zero_timeout = LocusConfig::default();
    zero_timeout.run_level.transition_timeout_secs = Some(0);
    assert!(validate_config(&zero_timeout).is_err());

    let mut bad_level = LocusConfig::default();
    bad_level.logging.level = "loud".to_string();
    assert!(validate_config(&bad_level).is_err());
}

// =============================================================================
// Environment
// =============================================================================

/// Test environment variables override the file
#[test]
#[ignore = "requires --test-threads=1 due to env var mutations"]
fn test_env_overrides_file() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_config(&dir, "[run_level]\nmax_threads = 2\n");
    set_env("LOCUS_RUN_LEVEL__MAX_THREADS", "6");
    set_env("LOCUS_LOCATOR__NAME", "from-env");

    let config = ConfigLoader::new().with_config_path(&path).load();

    remove_env("LOCUS_RUN_LEVEL__MAX_THREADS");
    remove_env("LOCUS_LOCATOR__NAME");
    let config = config.expect("load");
    assert_eq!(config.run_level.max_threads, 6);
    assert_eq!(config.locator.name, "from-env");
}
