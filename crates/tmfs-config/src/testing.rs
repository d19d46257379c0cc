//! Scratch HFS+ volume layout for tests.
//!
//! Provides `TestVolume`, a temporary directory laid out like a mounted Time
//! Machine volume:
//!
//! ```text
//! <hfs_root>/
//! ├── .HFS+ Private Directory Data\r/
//! │   └── dir_<N>/              # real contents of a disguised directory
//! ├── .links/                   # spare hard links that inflate link counts
//! └── Backups.backupdb/<host>/Latest/
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use tmfs_config::testing::TestVolume;
//!
//! let vol = TestVolume::new("myhost")?;
//! vol.create_file("Documents/report.txt", b"q3")?;
//! let photos = vol.create_disguised_dir("Documents/Photos", 137)?;
//! std::fs::write(photos.join("img1.jpg"), b"jpeg")?;
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use tempfile::TempDir;

/// Name of the private directory created on every test volume.
pub const TEST_PRIVATE_DIR: &str = ".HFS+ Private Directory Data\r";

/// Atomic counter for unique spare-link directories
static LINK_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Isolated fake Time Machine volume, removed on drop
pub struct TestVolume {
    /// Temporary directory (dropped on cleanup)
    _temp_dir: TempDir,
    /// Root of the fake HFS+ volume
    pub hfs_root: PathBuf,
    /// Host the snapshot belongs to
    pub hostname: String,
    /// `<hfs_root>/.HFS+ Private Directory Data\r`
    pub private_dir: PathBuf,
    /// `<hfs_root>/Backups.backupdb/<hostname>/Latest`
    pub snapshot_base: PathBuf,
}

impl TestVolume {
    /// Create a volume with an empty `Latest` snapshot for `hostname`
    pub fn new(hostname: &str) -> anyhow::Result<Self> {
        let temp_dir = TempDir::new()?;
        let hfs_root = temp_dir.path().join("hfs");
        let private_dir = hfs_root.join(TEST_PRIVATE_DIR);
        let snapshot_base = hfs_root
            .join("Backups.backupdb")
            .join(hostname)
            .join("Latest");

        fs::create_dir_all(&private_dir)?;
        fs::create_dir_all(&snapshot_base)?;
        fs::create_dir_all(hfs_root.join(".links"))?;

        Ok(Self {
            _temp_dir: temp_dir,
            hfs_root,
            hostname: hostname.to_string(),
            private_dir,
            snapshot_base,
        })
    }

    /// Create a volume that has a snapshot but no private directory
    pub fn without_private_dir(hostname: &str) -> anyhow::Result<Self> {
        let vol = Self::new(hostname)?;
        fs::remove_dir(&vol.private_dir)?;
        Ok(vol)
    }

    /// Create an ordinary file inside the snapshot
    pub fn create_file(&self, relative_path: &str, content: &[u8]) -> anyhow::Result<PathBuf> {
        let path = self.snapshot_base.join(relative_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Create an ordinary directory inside the snapshot
    pub fn create_dir(&self, relative_path: &str) -> anyhow::Result<PathBuf> {
        let path = self.snapshot_base.join(relative_path);
        fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Create a file inside the snapshot whose hard-link count is exactly
    /// `link_count`. The extra links live outside the snapshot.
    pub fn create_linked_file(
        &self,
        relative_path: &str,
        content: &[u8],
        link_count: u64,
    ) -> anyhow::Result<PathBuf> {
        let path = self.create_file(relative_path, content)?;
        self.inflate_links(&path, link_count)?;
        Ok(path)
    }

    /// Create a disguised directory: a 0-byte placeholder at `relative_path`
    /// with `link_count` hard links, plus the real `dir_<link_count>` in the
    /// private directory. Returns the private directory path.
    pub fn create_disguised_dir(
        &self,
        relative_path: &str,
        link_count: u64,
    ) -> anyhow::Result<PathBuf> {
        self.create_linked_file(relative_path, b"", link_count)?;
        let indirect = self.private_dir.join(format!("dir_{}", link_count));
        fs::create_dir_all(&indirect)?;
        Ok(indirect)
    }

    /// Path of `dir_<n>` in the private directory (may not exist)
    pub fn private_entry(&self, n: u64) -> PathBuf {
        self.private_dir.join(format!("dir_{}", n))
    }

    fn inflate_links(&self, target: &Path, link_count: u64) -> anyhow::Result<()> {
        let id = LINK_COUNTER.fetch_add(1, Ordering::Relaxed);
        let spare = self.hfs_root.join(".links").join(id.to_string());
        fs::create_dir_all(&spare)?;
        for i in 1..link_count {
            fs::hard_link(target, spare.join(i.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::MetadataExt;

    #[test]
    fn test_volume_creates_layout() {
        let vol = TestVolume::new("myhost").unwrap();
        assert!(vol.private_dir.is_dir());
        assert!(vol.snapshot_base.is_dir());
        assert!(vol.snapshot_base.ends_with("Backups.backupdb/myhost/Latest"));
    }

    #[test]
    fn test_without_private_dir() {
        let vol = TestVolume::without_private_dir("myhost").unwrap();
        assert!(!vol.private_dir.exists());
        assert!(vol.snapshot_base.is_dir());
    }

    #[test]
    fn test_linked_file_has_requested_link_count() {
        let vol = TestVolume::new("myhost").unwrap();
        let path = vol.create_linked_file("a/b.txt", b"data", 5).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().nlink(), 5);
    }

    #[test]
    fn test_disguised_dir_layout() {
        let vol = TestVolume::new("myhost").unwrap();
        let indirect = vol.create_disguised_dir("Documents/Photos", 120).unwrap();
        let placeholder = vol.snapshot_base.join("Documents/Photos");

        let meta = fs::metadata(&placeholder).unwrap();
        assert!(meta.is_file());
        assert_eq!(meta.len(), 0);
        assert_eq!(meta.nlink(), 120);
        assert!(indirect.is_dir());
        assert_eq!(indirect, vol.private_entry(120));
    }
}
