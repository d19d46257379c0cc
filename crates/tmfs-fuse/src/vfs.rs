//! Path-addressed filesystem verbs over a resolved snapshot.

use std::ffi::OsString;
use std::fs::{self, File, Metadata};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tmfs_config::{log_vfs_debug, log_vfs_error, log_vfs_warn};
use tmfs_resolver::{BackupRoot, PathResolver};

use crate::error::{VfsError, VfsResult};
use crate::handles::OpenHandles;

/// Inode value paired with every listed name; callers assign real ones.
pub const PLACEHOLDER_INO: u64 = 0;

/// One name in a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: OsString,
    pub ino: u64,
}

impl DirEntry {
    fn placeholder(name: impl Into<OsString>) -> Self {
        Self {
            name: name.into(),
            ino: PLACEHOLDER_INO,
        }
    }
}

/// Capacity figures for the volume holding the snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsStats {
    pub blocks: u64,
    pub blocks_free: u64,
    pub blocks_available: u64,
    pub files: u64,
    pub files_free: u64,
    pub block_size: u32,
    pub fragment_size: u32,
    pub name_max: u32,
}

impl From<nix::sys::statvfs::Statvfs> for FsStats {
    fn from(st: nix::sys::statvfs::Statvfs) -> Self {
        Self {
            blocks: st.blocks() as u64,
            blocks_free: st.blocks_free() as u64,
            blocks_available: st.blocks_available() as u64,
            files: st.files() as u64,
            files_free: st.files_free() as u64,
            block_size: st.block_size() as u32,
            fragment_size: st.fragment_size() as u32,
            name_max: st.name_max() as u32,
        }
    }
}

/// The verb surface a filesystem transport drives, addressed by conceptual
/// path.
///
/// The mutating verbs are part of the surface so a transport can route every
/// call; a read-only implementation rejects them.
pub trait ReadOnlyVfs {
    fn getattr(&self, path: &Path) -> VfsResult<Metadata>;
    /// Entries of a directory, followed by `.` and `..`.
    fn readdir(&self, path: &Path) -> VfsResult<Vec<DirEntry>>;
    fn statfs(&self) -> VfsResult<FsStats>;
    fn open(&mut self, path: &Path, flags: i32) -> VfsResult<()>;
    fn read(&self, path: &Path, size: u32, offset: u64) -> VfsResult<Vec<u8>>;
    fn readlink(&self, path: &Path) -> VfsResult<PathBuf>;
    fn release(&mut self, path: &Path, flags: i32) -> VfsResult<()>;

    fn rename(&self, from: &Path, to: &Path) -> VfsResult<()>;
    fn rmdir(&self, path: &Path) -> VfsResult<()>;
    fn chmod(&self, path: &Path, mode: u32) -> VfsResult<()>;
    fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> VfsResult<()>;
    fn fsync(&self, path: &Path, datasync: bool) -> VfsResult<()>;
    fn link(&self, target: &Path, link: &Path) -> VfsResult<()>;
    fn mkdir(&self, path: &Path, mode: u32) -> VfsResult<()>;
    fn mknod(&self, path: &Path, mode: u32, rdev: u32) -> VfsResult<()>;
    fn symlink(&self, target: &Path, link: &Path) -> VfsResult<()>;
    fn truncate(&self, path: &Path, size: u64) -> VfsResult<()>;
    fn unlink(&self, path: &Path) -> VfsResult<()>;
    fn utime(
        &self,
        path: &Path,
        atime: Option<SystemTime>,
        mtime: Option<SystemTime>,
    ) -> VfsResult<()>;
    fn write(&self, path: &Path, data: &[u8], offset: u64) -> VfsResult<u32>;
}

/// Read-only view of one Time Machine snapshot.
///
/// Every verb re-resolves its path; the only state is the table of
/// descriptors opened by `open` and awaiting `release`.
#[derive(Debug)]
pub struct TimeMachineFs {
    resolver: PathResolver,
    handles: OpenHandles,
}

impl TimeMachineFs {
    pub fn new(resolver: PathResolver) -> Self {
        Self {
            resolver,
            handles: OpenHandles::new(),
        }
    }

    pub fn from_root(root: BackupRoot) -> Self {
        Self::new(PathResolver::new(root))
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Number of descriptors opened and not yet released
    pub fn open_handles(&self) -> usize {
        self.handles.len()
    }

    fn real_path(&self, verb: &'static str, path: &Path) -> VfsResult<PathBuf> {
        log_vfs_debug!(
            "handling verb",
            verb = verb,
            path = tracing::field::display(path.display()),
        );
        self.resolver.resolve(path).map_err(|e| {
            log_vfs_debug!("resolution failed", verb = verb, error = tracing::field::display(&e));
            VfsError::from(e)
        })
    }

    fn reject(&self, verb: &'static str, path: &Path) -> VfsError {
        log_vfs_debug!(
            "rejecting mutating verb",
            verb = verb,
            path = tracing::field::display(path.display()),
        );
        VfsError::not_supported(verb)
    }
}

impl ReadOnlyVfs for TimeMachineFs {
    fn getattr(&self, path: &Path) -> VfsResult<Metadata> {
        let real = self.real_path("getattr", path)?;
        Ok(fs::metadata(real)?)
    }

    fn readdir(&self, path: &Path) -> VfsResult<Vec<DirEntry>> {
        let real = self.real_path("readdir", path)?;

        let mut entries = Vec::new();
        for entry in fs::read_dir(&real)? {
            let name = entry?.file_name();
            if name == "." || name == ".." {
                continue;
            }
            entries.push(DirEntry::placeholder(name));
        }
        entries.push(DirEntry::placeholder("."));
        entries.push(DirEntry::placeholder(".."));

        log_vfs_debug!("listed directory", entries = entries.len());
        Ok(entries)
    }

    fn statfs(&self) -> VfsResult<FsStats> {
        let real = self.real_path("statfs", Path::new("/"))?;
        let st = nix::sys::statvfs::statvfs(&real).map_err(std::io::Error::from)?;
        Ok(FsStats::from(st))
    }

    fn open(&mut self, path: &Path, flags: i32) -> VfsResult<()> {
        let real = self.real_path("open", path)?;
        // Write intents are accepted but only ever get a read-only descriptor.
        let file = File::open(&real)?;

        if self.handles.insert(path, flags, file).is_some() {
            log_vfs_warn!(
                "second open before release, earlier descriptor closed",
                path = tracing::field::display(path.display()),
                flags = flags,
            );
        }
        Ok(())
    }

    fn read(&self, path: &Path, size: u32, offset: u64) -> VfsResult<Vec<u8>> {
        let real = self.real_path("read", path)?;

        // Independent of any handle from `open`.
        let mut file = File::open(&real)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = Vec::with_capacity(size as usize);
        file.take(u64::from(size)).read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn readlink(&self, path: &Path) -> VfsResult<PathBuf> {
        let real = self.real_path("readlink", path)?;
        Ok(fs::read_link(real)?)
    }

    fn release(&mut self, path: &Path, flags: i32) -> VfsResult<()> {
        log_vfs_debug!(
            "handling verb",
            verb = "release",
            path = tracing::field::display(path.display()),
        );
        match self.handles.remove(path, flags) {
            Some(file) => {
                drop(file);
                Ok(())
            }
            None => {
                log_vfs_error!(
                    "release without matching open",
                    path = tracing::field::display(path.display()),
                    flags = flags,
                );
                Err(VfsError::UnknownHandle {
                    path: path.to_path_buf(),
                    flags,
                })
            }
        }
    }

    fn rename(&self, from: &Path, _to: &Path) -> VfsResult<()> {
        Err(self.reject("rename", from))
    }

    fn rmdir(&self, path: &Path) -> VfsResult<()> {
        Err(self.reject("rmdir", path))
    }

    fn chmod(&self, path: &Path, _mode: u32) -> VfsResult<()> {
        Err(self.reject("chmod", path))
    }

    fn chown(&self, path: &Path, _uid: Option<u32>, _gid: Option<u32>) -> VfsResult<()> {
        Err(self.reject("chown", path))
    }

    fn fsync(&self, path: &Path, _datasync: bool) -> VfsResult<()> {
        Err(self.reject("fsync", path))
    }

    fn link(&self, _target: &Path, link: &Path) -> VfsResult<()> {
        Err(self.reject("link", link))
    }

    fn mkdir(&self, path: &Path, _mode: u32) -> VfsResult<()> {
        Err(self.reject("mkdir", path))
    }

    fn mknod(&self, path: &Path, _mode: u32, _rdev: u32) -> VfsResult<()> {
        Err(self.reject("mknod", path))
    }

    fn symlink(&self, _target: &Path, link: &Path) -> VfsResult<()> {
        Err(self.reject("symlink", link))
    }

    fn truncate(&self, path: &Path, _size: u64) -> VfsResult<()> {
        Err(self.reject("truncate", path))
    }

    fn unlink(&self, path: &Path) -> VfsResult<()> {
        Err(self.reject("unlink", path))
    }

    fn utime(
        &self,
        path: &Path,
        _atime: Option<SystemTime>,
        _mtime: Option<SystemTime>,
    ) -> VfsResult<()> {
        Err(self.reject("utime", path))
    }

    fn write(&self, path: &Path, _data: &[u8], _offset: u64) -> VfsResult<u32> {
        Err(self.reject("write", path))
    }
}
