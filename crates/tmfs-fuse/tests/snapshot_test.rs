//! End-to-end verb tests against a fake Time Machine volume.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use tmfs_config::testing::TestVolume;
use tmfs_fuse::{ReadOnlyVfs, TimeMachineFs, VfsError};
use tmfs_resolver::BackupRoot;

/// `Documents/report.txt` plus `Documents/Photos` disguised as `dir_137`
fn documents_volume() -> (TestVolume, TimeMachineFs) {
    let vol = TestVolume::new("myhost").unwrap();
    vol.create_file("Documents/report.txt", b"revenue up").unwrap();
    let photos = vol.create_disguised_dir("Documents/Photos", 137).unwrap();
    fs::write(photos.join("img1.jpg"), b"\xff\xd8\xff\xe0jpeg").unwrap();

    let root = BackupRoot::open(&vol.hfs_root, &vol.hostname).unwrap();
    (vol, TimeMachineFs::from_root(root))
}

fn listing(vfs: &TimeMachineFs, path: &str) -> BTreeSet<String> {
    vfs.readdir(Path::new(path))
        .unwrap()
        .into_iter()
        .map(|e| e.name.to_string_lossy().into_owned())
        .collect()
}

#[test]
fn test_photos_scenario() {
    let (vol, vfs) = documents_volume();

    assert_eq!(
        vfs.resolver().resolve("/Documents/report.txt").unwrap(),
        vol.snapshot_base.join("Documents/report.txt")
    );
    assert_eq!(
        vfs.resolver().resolve("/Documents/Photos/img1.jpg").unwrap(),
        vol.private_dir.join("dir_137/img1.jpg")
    );

    let expected: BTreeSet<String> = [".", "..", "img1.jpg"]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(listing(&vfs, "/Documents/Photos"), expected);
}

#[test]
fn test_listing_shows_placeholder_under_its_name() {
    let (_vol, vfs) = documents_volume();
    let names = listing(&vfs, "/Documents");
    assert!(names.contains("Photos"));
    assert!(names.contains("report.txt"));
    assert_eq!(names.len(), 4);

    assert!(vfs.getattr(Path::new("/Documents/Photos")).unwrap().is_dir());
}

#[test]
fn test_read_through_disguised_dir() {
    let (_vol, vfs) = documents_volume();
    let data = vfs
        .read(Path::new("/Documents/Photos/img1.jpg"), 4096, 4)
        .unwrap();
    assert_eq!(data, b"jpeg");
}

#[test]
fn test_open_release_cycle_through_disguised_dir() {
    let (_vol, mut vfs) = documents_volume();
    let p = Path::new("/Documents/Photos/img1.jpg");

    vfs.open(p, libc::O_RDONLY).unwrap();
    assert_eq!(vfs.read(p, 2, 0).unwrap(), b"\xff\xd8");
    vfs.release(p, libc::O_RDONLY).unwrap();
    assert_eq!(vfs.open_handles(), 0);
}

#[test]
fn test_corrupt_backup_surfaces_as_enoent() {
    let (vol, vfs) = documents_volume();
    fs::remove_file(vol.private_dir.join("dir_137/img1.jpg")).unwrap();
    fs::remove_dir(vol.private_dir.join("dir_137")).unwrap();

    let err = vfs.getattr(Path::new("/Documents/Photos")).unwrap_err();
    assert!(err.is_corrupt_backup());
    assert_eq!(err.errno(), libc::ENOENT);
}

#[test]
fn test_mutating_verbs_are_rejected_without_side_effects() {
    let (vol, vfs) = documents_volume();
    let report = Path::new("/Documents/report.txt");
    let fresh = Path::new("/Documents/new");
    let real_report = vol.snapshot_base.join("Documents/report.txt");
    let before = fs::read(&real_report).unwrap();

    let results: Vec<(&str, Result<(), VfsError>)> = vec![
        ("rename", vfs.rename(report, fresh)),
        ("rmdir", vfs.rmdir(Path::new("/Documents"))),
        ("chmod", vfs.chmod(report, 0o777)),
        ("chown", vfs.chown(report, Some(0), Some(0))),
        ("fsync", vfs.fsync(report, false)),
        ("link", vfs.link(report, fresh)),
        ("mkdir", vfs.mkdir(fresh, 0o755)),
        ("mknod", vfs.mknod(fresh, 0o644, 0)),
        ("symlink", vfs.symlink(report, fresh)),
        ("truncate", vfs.truncate(report, 0)),
        ("unlink", vfs.unlink(report)),
        ("utime", vfs.utime(report, None, None)),
        ("write", vfs.write(report, b"overwrite", 0).map(|_| ())),
    ];

    for (verb, result) in results {
        match result {
            Err(VfsError::NotSupported { verb: v }) => assert_eq!(v, verb),
            other => panic!("{verb}: expected NotSupported, got {other:?}"),
        }
    }

    assert_eq!(fs::read(&real_report).unwrap(), before);
    assert!(!vol.snapshot_base.join("Documents/new").exists());
    assert!(vol.snapshot_base.join("Documents").is_dir());
}

#[test]
fn test_release_without_open_is_a_contract_violation() {
    let (_vol, mut vfs) = documents_volume();
    let err = vfs
        .release(Path::new("/Documents/report.txt"), libc::O_RDONLY)
        .unwrap_err();
    assert!(matches!(err, VfsError::UnknownHandle { .. }));
    assert_eq!(err.errno(), libc::EBADF);
}
