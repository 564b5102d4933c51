//! Configuration and root folder resolution
//!
//! Tests that touch ROASTLOG_ROOT are marked #[serial] so they never run in parallel.

use roastlog_common::config::{
    write_toml_config, CompiledDefaults, ModelsConfig, RootFolderInitializer, RootFolderResolver,
    TomlConfig, ROOT_ENV_VAR,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_compiled_defaults_for_current_platform() {
    let defaults = CompiledDefaults::for_current_platform();

    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert!(defaults.root_folder.ends_with("roastlog") || defaults.root_folder.ends_with("roastlog_data"));
    assert_eq!(defaults.log_level, "info");
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_ENV_VAR);

    let root = RootFolderResolver::new().resolve();

    assert_eq!(root, CompiledDefaults::for_current_platform().root_folder);
}

#[test]
#[serial]
fn test_resolver_env_var() {
    env::set_var(ROOT_ENV_VAR, "/tmp/roastlog-test-env");

    let root = RootFolderResolver::new().resolve();
    assert_eq!(root, PathBuf::from("/tmp/roastlog-test-env"));

    env::remove_var(ROOT_ENV_VAR);
}

#[test]
#[serial]
fn test_resolver_cli_arg_beats_env_and_toml() {
    env::set_var(ROOT_ENV_VAR, "/tmp/roastlog-from-env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/roastlog-from-toml")),
        ..Default::default()
    };

    let root = RootFolderResolver::new()
        .with_cli_arg(Some(PathBuf::from("/tmp/roastlog-from-cli")))
        .with_config(&config)
        .resolve();
    assert_eq!(root, PathBuf::from("/tmp/roastlog-from-cli"));

    env::remove_var(ROOT_ENV_VAR);
}

#[test]
#[serial]
fn test_resolver_env_beats_toml() {
    env::set_var(ROOT_ENV_VAR, "/tmp/roastlog-from-env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/roastlog-from-toml")),
        ..Default::default()
    };

    let root = RootFolderResolver::new().with_config(&config).resolve();
    assert_eq!(root, PathBuf::from("/tmp/roastlog-from-env"));

    env::remove_var(ROOT_ENV_VAR);
}

#[test]
#[serial]
fn test_resolver_toml_used_when_env_blank() {
    env::set_var(ROOT_ENV_VAR, "  ");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/roastlog-from-toml")),
        ..Default::default()
    };

    let root = RootFolderResolver::new().with_config(&config).resolve();
    assert_eq!(root, PathBuf::from("/tmp/roastlog-from-toml"));

    env::remove_var(ROOT_ENV_VAR);
}

#[test]
fn test_toml_parses_partial_file_with_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
root_folder = "/srv/roastlog"

[models]
scout_model = "custom/scout.json"
"#,
    )
    .unwrap();

    let config = TomlConfig::from_file(&path).unwrap();
    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/roastlog")));
    assert_eq!(config.logging.level, "info");
    assert!(config.report.color);
    assert_eq!(config.models.core_meta, None);
    assert_eq!(config.models.scout_model, Some(PathBuf::from("custom/scout.json")));
}

#[test]
fn test_missing_config_file_falls_back_to_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("does-not-exist.toml");

    assert!(TomlConfig::from_file(&path).is_err());
    assert_eq!(TomlConfig::load_or_default(Some(&path)), TomlConfig::default());
}

#[test]
fn test_invalid_config_file_falls_back_to_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "root_folder = [not valid").unwrap();

    assert_eq!(TomlConfig::load_or_default(Some(&path)), TomlConfig::default());
}

#[test]
fn test_write_then_load_config() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("config.toml");
    let mut config = TomlConfig::default();
    config.logging.level = "debug".to_string();
    config.report.color = false;

    write_toml_config(&config, &path).unwrap();

    assert_eq!(TomlConfig::load_or_default(Some(&path)), config);
}

#[test]
fn test_initializer_layout() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("data");
    let init = RootFolderInitializer::new(root.clone());

    init.ensure_directory_exists().unwrap();
    assert!(root.is_dir());

    assert_eq!(init.database_path(), root.join("roastlog.db"));
    assert_eq!(init.core_meta_path(), root.join("models/core/core_meta.json"));
    assert_eq!(init.scout_model_path(), root.join("models/scout/scout_model.json"));
}

#[test]
fn test_initializer_model_overrides() {
    let init = RootFolderInitializer::new(PathBuf::from("/data/roastlog")).with_models(ModelsConfig {
        core_meta: Some(PathBuf::from("/opt/models/core_meta.json")),
        scout_model: Some(PathBuf::from("alt/scout.json")),
    });

    assert_eq!(init.core_meta_path(), PathBuf::from("/opt/models/core_meta.json"));
    assert_eq!(init.scout_model_path(), PathBuf::from("/data/roastlog/alt/scout.json"));
}
