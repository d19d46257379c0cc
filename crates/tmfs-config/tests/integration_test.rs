//! Integration tests for tmfs-config
//!
//! These tests verify the config loading pipeline with real file system operations.

use std::path::PathBuf;
use tempfile::tempdir;
use tmfs_config::{Config, ConfigError};

/// Test config loading from a real config file
#[test]
fn test_load_config_from_file() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[backup]
hfs_root = "/Volumes/Time Machine"
hostname = "myhost"

[mount]
mountpoint = "/mnt/tm"
allow_other = true

[log]
level = "debug"
"#,
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(
        config.backup.hfs_root,
        Some(PathBuf::from("/Volumes/Time Machine"))
    );
    assert_eq!(config.backup.hostname.as_deref(), Some("myhost"));
    assert_eq!(config.mount.mountpoint, Some(PathBuf::from("/mnt/tm")));
    assert!(config.mount.allow_other);
    assert!(!config.mount.auto_unmount);
    assert_eq!(config.mount.fsname, "tmfs");
    assert_eq!(config.log.level, "debug");
}

/// Test local config overrides global
#[test]
fn test_config_hierarchy_local_overrides_global() {
    let temp = tempdir().unwrap();
    let global_path = temp.path().join("global.toml");
    let local_path = temp.path().join("local.toml");
    std::fs::write(
        &global_path,
        r#"
[backup]
hfs_root = "/Volumes/TM"
hostname = "laptop"

[mount]
fsname = "timemachine"
"#,
    )
    .unwrap();
    std::fs::write(
        &local_path,
        r#"
[backup]
hostname = "desktop"
"#,
    )
    .unwrap();

    let mut config = Config::load_from(&global_path).unwrap();
    config.merge(Config::load_from(&local_path).unwrap());

    let (root, host) = config.backup_settings().unwrap();
    assert_eq!(root, PathBuf::from("/Volumes/TM"));
    assert_eq!(host, "desktop");
    assert_eq!(config.mount.fsname, "timemachine");
}

#[test]
fn test_invalid_toml_is_reported() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "[backup\nhostname = ").unwrap();

    let err = Config::load_from(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Toml(_)));
}

#[test]
fn test_missing_file_is_io_error() {
    let temp = tempdir().unwrap();
    let err = Config::load_from(temp.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn test_default_toml_parses_back() {
    let parsed: Config = toml::from_str(&Config::default_toml()).unwrap();
    assert_eq!(parsed.mount.fsname, "tmfs");
    assert!(parsed.backup.hostname.is_none());
}
