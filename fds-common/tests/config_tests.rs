//! Tests for configuration loading, root folder resolution and atomic writes
//!
//! Tests that manipulate FDS_ROOT are marked with #[serial] so they do not
//! race each other on the process environment.

use fds_common::config::{
    load_toml_config, resolve_config, resolve_config_from, resolve_root_folder, write_toml_config,
    ConfigSource, EstimatorConfig, LoggingConfig, TomlConfig, DEFAULT_SEED, ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn sample_config() -> TomlConfig {
    TomlConfig {
        root_folder: Some(PathBuf::from("/srv/crowd")),
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
        estimator: EstimatorConfig {
            algorithm: "H".to_string(),
            tolerance: 1e-5,
            switch_tolerance: 1e-2,
            max_iterations: 50,
            seed: 42,
            tie_break: "lowest-index".to_string(),
        },
    }
}

#[test]
#[serial]
fn test_root_folder_cli_takes_precedence() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/fds-env-root");
    let config = sample_config();

    let root = resolve_root_folder(Some(Path::new("/tmp/fds-cli-root")), ROOT_FOLDER_ENV, &config);
    assert_eq!(root, PathBuf::from("/tmp/fds-cli-root"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_root_folder_env_over_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/fds-env-root");
    let config = sample_config();

    let root = resolve_root_folder(None, ROOT_FOLDER_ENV, &config);
    assert_eq!(root, PathBuf::from("/tmp/fds-env-root"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_root_folder_toml_then_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let config = sample_config();
    assert_eq!(
        resolve_root_folder(None, ROOT_FOLDER_ENV, &config),
        PathBuf::from("/srv/crowd")
    );

    let empty = TomlConfig::default();
    assert_eq!(resolve_root_folder(None, ROOT_FOLDER_ENV, &empty), PathBuf::from("."));
}

#[test]
fn test_write_then_load_preserves_fields() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("config.toml");

    let config = sample_config();
    write_toml_config(&config, &target).unwrap();

    assert!(target.exists());
    assert!(!temp_dir.path().join("config.toml.tmp").exists());

    let loaded = load_toml_config(&target).unwrap();
    assert_eq!(loaded, config);
}

#[cfg(unix)]
#[test]
fn test_written_config_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("config.toml");
    write_toml_config(&TomlConfig::default(), &target).unwrap();

    let mode = std::fs::metadata(&target).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn test_explicit_missing_file_is_error() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("nope.toml");

    assert!(resolve_config(Some(&missing)).is_err());
}

#[test]
fn test_explicit_invalid_toml_is_error() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("broken.toml");
    std::fs::write(&target, "[estimator\nalgorithm = ").unwrap();

    assert!(resolve_config(Some(&target)).is_err());
}

#[test]
fn test_explicit_file_loads() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("fds.toml");
    std::fs::write(
        &target,
        "[estimator]\nalgorithm = \"DS\"\nmax_iterations = 10\n",
    )
    .unwrap();

    let resolved = resolve_config(Some(&target)).unwrap();
    assert_eq!(resolved.source, ConfigSource::Explicit(target.clone()));
    assert!(!resolved.source.is_fallback());
    assert_eq!(resolved.config.estimator.algorithm, "DS");
    assert_eq!(resolved.config.estimator.max_iterations, 10);
    assert_eq!(resolved.config.estimator.tie_break, "random");
    assert_eq!(resolved.config.estimator.seed, DEFAULT_SEED);
}

#[test]
fn test_broken_default_file_falls_back_and_reports() {
    let temp_dir = TempDir::new().unwrap();
    let default_path = temp_dir.path().join("config.toml");
    std::fs::write(&default_path, "this is [[ not toml").unwrap();

    let resolved = resolve_config_from(None, Some(default_path.clone())).unwrap();
    assert_eq!(resolved.config, TomlConfig::default());
    assert!(resolved.source.is_fallback());
    match &resolved.source {
        ConfigSource::Unreadable { path, error } => {
            assert_eq!(path, &default_path);
            assert!(!error.is_empty());
        }
        other => panic!("expected unreadable default, got {:?}", other),
    }
}

#[test]
fn test_missing_default_file_falls_back() {
    let temp_dir = TempDir::new().unwrap();
    let default_path = temp_dir.path().join("absent.toml");

    let resolved = resolve_config_from(None, Some(default_path.clone())).unwrap();
    assert_eq!(resolved.config, TomlConfig::default());
    assert_eq!(resolved.source, ConfigSource::MissingDefault(default_path));
    assert!(resolved.source.is_fallback());

    let resolved = resolve_config_from(None, None).unwrap();
    assert_eq!(resolved.source, ConfigSource::NoConfigDir);
}

#[test]
fn test_valid_default_file_is_used() {
    let temp_dir = TempDir::new().unwrap();
    let default_path = temp_dir.path().join("config.toml");
    write_toml_config(&sample_config(), &default_path).unwrap();

    let resolved = resolve_config_from(None, Some(default_path.clone())).unwrap();
    assert_eq!(resolved.config, sample_config());
    assert_eq!(resolved.source, ConfigSource::Default(default_path));
}
