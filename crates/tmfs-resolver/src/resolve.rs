//! Component-by-component path resolution.

use std::ffi::OsStr;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Component, Path, PathBuf};

use tmfs_config::{log_resolve_error, log_resolve_trace};

use crate::{BackupRoot, ResolveError, Result, DISGUISED_DIR_MIN_LINKS};

/// What a non-directory entry in the snapshot tree stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryClass {
    /// An ordinary file, used as is
    File,
    /// A placeholder for `dir_<link_count>` in the private directory
    DisguisedDir,
}

/// Classify a non-directory entry by its size and hard-link count.
///
/// The test is kept in the shape the backup format was reverse-engineered
/// with: any content, or fewer than [`DISGUISED_DIR_MIN_LINKS`] links, means a
/// real file.
pub fn classify(size: u64, link_count: u64) -> EntryClass {
    if size > 0 || link_count < DISGUISED_DIR_MIN_LINKS {
        EntryClass::File
    } else {
        EntryClass::DisguisedDir
    }
}

/// Translates conceptual snapshot paths into real paths on the HFS+ volume.
///
/// Holds no state besides the [`BackupRoot`]; nothing is cached between
/// calls, so every resolution reflects the volume as it is right now.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: BackupRoot,
}

impl PathResolver {
    pub fn new(root: BackupRoot) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &BackupRoot {
        &self.root
    }

    /// Resolve `path` (e.g. `/Documents/Photos/img1.jpg`) to the real path
    /// that currently backs it.
    ///
    /// The empty path and `/` resolve to the snapshot base. A `..` component
    /// is never followed.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        let mut current = self.root.snapshot_base().to_path_buf();

        for component in path.components() {
            let name = match component {
                Component::Normal(name) => name,
                Component::RootDir | Component::CurDir | Component::Prefix(_) => continue,
                Component::ParentDir => {
                    return Err(ResolveError::NotFound {
                        path: path.to_path_buf(),
                    })
                }
            };
            current = self.step(&current, name)?;
        }

        log_resolve_trace!(
            "resolved",
            path = tracing::field::display(path.display()),
            real = tracing::field::display(current.display()),
        );
        Ok(current)
    }

    fn step(&self, current: &Path, name: &OsStr) -> Result<PathBuf> {
        let candidate = current.join(name);

        // Unmodified tree structure: a real directory.
        if candidate.is_dir() {
            return Ok(candidate);
        }

        let meta = fs::metadata(&candidate).map_err(|e| ResolveError::from_io(&candidate, e))?;
        let link_count = meta.nlink();

        match classify(meta.size(), link_count) {
            EntryClass::File => Ok(candidate),
            EntryClass::DisguisedDir => {
                let indirect = self.root.private_dir().join(format!("dir_{}", link_count));
                if !indirect.is_dir() {
                    log_resolve_error!(
                        "placeholder does not map to a private directory",
                        placeholder = tracing::field::display(candidate.display()),
                        indirect = tracing::field::display(indirect.display()),
                        link_count = link_count,
                    );
                    return Err(ResolveError::CorruptBackup {
                        placeholder: candidate,
                        indirect,
                        link_count,
                    });
                }
                Ok(indirect)
            }
        }
    }
}
