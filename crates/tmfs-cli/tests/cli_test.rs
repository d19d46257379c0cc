//! Integration tests for the tmfs binary

use std::fs;
use std::process::{Command, Output};

use tmfs_config::testing::TestVolume;

/// Helper to run tmfs with a clean environment
fn tmfs(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tmfs"))
        .args(args)
        .env_remove("TMFS_HFS_ROOT")
        .env_remove("TMFS_HOSTNAME")
        .env_remove("TMFS_MOUNTPOINT")
        .env_remove("TMFS_LOG")
        .output()
        .expect("Failed to execute tmfs")
}

fn photos_volume() -> TestVolume {
    let vol = TestVolume::new("myhost").unwrap();
    vol.create_file("Documents/report.txt", b"report").unwrap();
    let photos = vol.create_disguised_dir("Documents/Photos", 137).unwrap();
    fs::write(photos.join("img1.jpg"), b"jpeg").unwrap();
    vol
}

#[test]
fn test_help() {
    let output = tmfs(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("mount"));
    assert!(stdout.contains("resolve"));
}

#[test]
fn test_resolve_prints_private_path() {
    let vol = photos_volume();
    let hfs = vol.hfs_root.to_string_lossy().into_owned();
    let output = tmfs(&[
        "resolve",
        "/Documents/Photos/img1.jpg",
        "--hfs-path",
        &hfs,
        "--hostname",
        "myhost",
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "{:?}", output);
    assert_eq!(
        stdout.trim_end(),
        vol.private_dir.join("dir_137/img1.jpg").to_string_lossy()
    );
}

#[test]
fn test_resolve_missing_path_fails() {
    let vol = photos_volume();
    let hfs = vol.hfs_root.to_string_lossy().into_owned();
    let output = tmfs(&[
        "resolve",
        "/Documents/nope.txt",
        "--hfs-path",
        &hfs,
        "--hostname",
        "myhost",
    ]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Cannot resolve"));
}

#[test]
fn test_ls_lists_disguised_directory() {
    let vol = photos_volume();
    let hfs = vol.hfs_root.to_string_lossy().into_owned();
    let output = tmfs(&[
        "ls",
        "/Documents/Photos",
        "--hfs-path",
        &hfs,
        "--hostname",
        "myhost",
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "{:?}", output);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines, vec![".", "..", "img1.jpg"]);
}

#[test]
fn test_missing_private_dir_is_fatal() {
    let vol = TestVolume::without_private_dir("myhost").unwrap();
    let hfs = vol.hfs_root.to_string_lossy().into_owned();
    let output = tmfs(&["ls", "/", "--hfs-path", &hfs, "--hostname", "myhost"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("private directory"));
}

#[test]
fn test_unknown_host_is_fatal() {
    let vol = photos_volume();
    let hfs = vol.hfs_root.to_string_lossy().into_owned();
    let output = tmfs(&["ls", "/", "--hfs-path", &hfs, "--hostname", "nobody"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("snapshot not found"));
}

#[test]
fn test_config_path() {
    let output = tmfs(&["config", "path"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("Local:"));
}
