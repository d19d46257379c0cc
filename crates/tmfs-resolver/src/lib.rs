//! # tmfs-resolver
//!
//! Path translation for HFS+ Time Machine backups.
//!
//! A Time Machine volume stores unchanged files as hard links. Directories
//! cannot be hard linked in the user-facing tree, so the backup tool leaves a
//! 0-byte placeholder file whose inflated link count `N` names the real
//! subtree, `dir_N`, inside the volume's private directory:
//!
//! ```text
//! /Volumes/TM/
//! ├── .HFS+ Private Directory Data\r/
//! │   └── dir_137/img1.jpg
//! └── Backups.backupdb/myhost/Latest/
//!     └── Documents/
//!         ├── report.txt          # ordinary file
//!         └── Photos              # 0 bytes, nlink = 137
//! ```
//!
//! [`PathResolver`] walks a conceptual path (`/Documents/Photos/img1.jpg`)
//! and returns the real location (`.../dir_137/img1.jpg`).

mod resolve;

pub use resolve::{classify, EntryClass, PathResolver};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tmfs_config::{log_resolve_debug, log_resolve_warn, ConfigError};

/// Name prefix of the HFS+ private metadata directory at the volume root.
pub const PRIVATE_DIR_PREFIX: &str = ".HFS+ Private Directory Data";

/// Placeholders must carry at least this many links to be treated as
/// disguised directories.
pub const DISGUISED_DIR_MIN_LINKS: u64 = 100;

/// Directory holding per-host backup histories.
pub const BACKUPS_DB: &str = "Backups.backupdb";

/// Symlink naming the most recent snapshot of a host.
pub const LATEST: &str = "Latest";

/// Errors that can occur while resolving a conceptual path
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("no such entry: {}", path.display())]
    NotFound { path: PathBuf },

    /// A placeholder's link count pointed at something that is not a directory.
    #[error(
        "corrupt backup: {} (nlink {link_count}) maps to {}, which is not a directory",
        placeholder.display(),
        indirect.display()
    )]
    CorruptBackup {
        placeholder: PathBuf,
        indirect: PathBuf,
        link_count: u64,
    },

    #[error("permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ResolveError {
    /// Classify a host `stat` failure on `path`.
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => ResolveError::NotFound {
                path: path.to_path_buf(),
            },
            io::ErrorKind::PermissionDenied => ResolveError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => ResolveError::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, ResolveError>;

/// Validated location of one host's latest snapshot on an HFS+ volume.
///
/// Built once at startup and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRoot {
    hfs_root: PathBuf,
    hostname: String,
    private_dir: PathBuf,
    snapshot_base: PathBuf,
}

impl BackupRoot {
    /// Validate `hfs_root` as a Time Machine volume holding a `Latest`
    /// snapshot for `hostname`.
    pub fn open(hfs_root: impl AsRef<Path>, hostname: &str) -> std::result::Result<Self, ConfigError> {
        let hfs_root = hfs_root.as_ref().to_path_buf();

        let private_dir = find_private_dir(&hfs_root)?;

        let snapshot_base = hfs_root.join(BACKUPS_DB).join(hostname).join(LATEST);
        if fs::metadata(&snapshot_base).is_err() {
            return Err(ConfigError::MissingSnapshot {
                path: snapshot_base,
            });
        }

        log_resolve_debug!(
            "backup root opened",
            private_dir = tracing::field::display(private_dir.display()),
            snapshot_base = tracing::field::display(snapshot_base.display()),
        );

        Ok(Self {
            hfs_root,
            hostname: hostname.to_string(),
            private_dir,
            snapshot_base,
        })
    }

    pub fn hfs_root(&self) -> &Path {
        &self.hfs_root
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// The HFS+ private directory holding `dir_<N>` subtrees
    pub fn private_dir(&self) -> &Path {
        &self.private_dir
    }

    /// `<hfs_root>/Backups.backupdb/<hostname>/Latest`
    pub fn snapshot_base(&self) -> &Path {
        &self.snapshot_base
    }
}

fn find_private_dir(hfs_root: &Path) -> std::result::Result<PathBuf, ConfigError> {
    let entries = fs::read_dir(hfs_root).map_err(|source| ConfigError::HfsRootUnreadable {
        path: hfs_root.to_path_buf(),
        source,
    })?;

    let mut matches: Vec<_> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name())
        .filter(|name| name.to_string_lossy().starts_with(PRIVATE_DIR_PREFIX))
        .collect();
    matches.sort();

    if matches.len() > 1 {
        log_resolve_warn!(
            "multiple private directories, using the first",
            count = matches.len(),
        );
    }

    matches
        .into_iter()
        .next()
        .map(|name| hfs_root.join(name))
        .ok_or_else(|| ConfigError::MissingPrivateDir {
            hfs_root: hfs_root.to_path_buf(),
        })
}
