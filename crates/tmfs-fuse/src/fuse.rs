//! Kernel-facing FUSE session.
//!
//! Translates inode-addressed `fuser` callbacks into conceptual paths and
//! forwards them to [`TimeMachineFs`](crate::TimeMachineFs).

use tmfs_config::MountConfig;

/// Options applied when mounting
#[derive(Debug, Clone)]
pub struct MountOptions {
    pub fsname: String,
    pub allow_other: bool,
    pub auto_unmount: bool,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self::from(&MountConfig::default())
    }
}

impl From<&MountConfig> for MountOptions {
    fn from(cfg: &MountConfig) -> Self {
        Self {
            fsname: cfg.fsname.clone(),
            allow_other: cfg.allow_other,
            auto_unmount: cfg.auto_unmount,
        }
    }
}

#[cfg(all(feature = "fuse", target_os = "linux"))]
mod imp {
    use std::ffi::OsStr;
    use std::fs::Metadata;
    use std::os::unix::ffi::OsStrExt;
    use std::os::unix::fs::{FileTypeExt, MetadataExt};
    use std::path::{Path, PathBuf};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use fuser::{
        FileAttr, FileType, Filesystem, MountOption, ReplyAttr, ReplyData, ReplyDirectory,
        ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request, TimeOrNow,
    };
    use libc::{c_int, EINVAL, ENOENT, ENOSYS};
    use tmfs_config::log_vfs_debug;

    use super::MountOptions;
    use crate::error::VfsResult;
    use crate::inode::InodeTable;
    use crate::vfs::{ReadOnlyVfs, TimeMachineFs};

    const TTL: Duration = Duration::from_secs(1);

    pub struct TimeMachineMount {
        vfs: TimeMachineFs,
        inodes: InodeTable,
        options: MountOptions,
    }

    impl TimeMachineMount {
        pub fn new(vfs: TimeMachineFs, options: MountOptions) -> Self {
            Self {
                vfs,
                inodes: InodeTable::new(),
                options,
            }
        }

        /// Mount the filesystem at the given path and serve it until
        /// unmounted (Ref: <https://docs.rs/fuser>)
        pub fn mount(self, mountpoint: &Path) -> anyhow::Result<()> {
            let mut opts = vec![
                MountOption::RO,
                MountOption::FSName(self.options.fsname.clone()),
                MountOption::Subtype("tmfs".to_string()),
            ];
            if self.options.allow_other {
                opts.push(MountOption::AllowOther);
            }
            if self.options.auto_unmount {
                opts.push(MountOption::AutoUnmount);
            }

            fuser::mount2(self, mountpoint, &opts)?;
            Ok(())
        }

        fn path_of(&self, ino: u64) -> Option<PathBuf> {
            self.inodes.path(ino).map(Path::to_path_buf)
        }

        fn attr(ino: u64, meta: &Metadata) -> FileAttr {
            FileAttr {
                ino,
                size: meta.size(),
                blocks: meta.blocks(),
                atime: system_time(meta.atime(), meta.atime_nsec()),
                mtime: system_time(meta.mtime(), meta.mtime_nsec()),
                ctime: system_time(meta.ctime(), meta.ctime_nsec()),
                crtime: meta.created().unwrap_or(UNIX_EPOCH),
                kind: file_type(meta),
                perm: (meta.mode() & 0o7777) as u16,
                nlink: meta.nlink() as u32,
                uid: meta.uid(),
                gid: meta.gid(),
                rdev: meta.rdev() as u32,
                blksize: meta.blksize() as u32,
                flags: 0,
            }
        }
    }

    fn system_time(secs: i64, nsecs: i64) -> SystemTime {
        if secs >= 0 {
            UNIX_EPOCH + Duration::new(secs as u64, nsecs as u32)
        } else {
            UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs())
        }
    }

    fn file_type(meta: &Metadata) -> FileType {
        let ft = meta.file_type();
        if ft.is_dir() {
            FileType::Directory
        } else if ft.is_symlink() {
            FileType::Symlink
        } else if ft.is_block_device() {
            FileType::BlockDevice
        } else if ft.is_char_device() {
            FileType::CharDevice
        } else if ft.is_fifo() {
            FileType::NamedPipe
        } else if ft.is_socket() {
            FileType::Socket
        } else {
            FileType::RegularFile
        }
    }

    /// Errno for a verb that only ever fails
    fn refused<T>(result: VfsResult<T>) -> c_int {
        result.err().map_or(ENOSYS, |e| e.errno())
    }

    impl Filesystem for TimeMachineMount {
        fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
            let Some(path) = self.inodes.child(parent, name) else {
                reply.error(ENOENT);
                return;
            };
            match self.vfs.getattr(&path) {
                Ok(meta) => {
                    let ino = self.inodes.intern(path);
                    reply.entry(&TTL, &Self::attr(ino, &meta), 0);
                }
                Err(e) => reply.error(e.errno()),
            }
        }

        fn getattr(&mut self, _req: &Request, ino: u64, reply: ReplyAttr) {
            let Some(path) = self.path_of(ino) else {
                reply.error(ENOENT);
                return;
            };
            match self.vfs.getattr(&path) {
                Ok(meta) => reply.attr(&TTL, &Self::attr(ino, &meta)),
                Err(e) => reply.error(e.errno()),
            }
        }

        fn setattr(
            &mut self,
            _req: &Request,
            ino: u64,
            mode: Option<u32>,
            uid: Option<u32>,
            gid: Option<u32>,
            size: Option<u64>,
            atime: Option<TimeOrNow>,
            mtime: Option<TimeOrNow>,
            _ctime: Option<SystemTime>,
            _fh: Option<u64>,
            _crtime: Option<SystemTime>,
            _chgtime: Option<SystemTime>,
            _bkuptime: Option<SystemTime>,
            _flags: Option<u32>,
            reply: ReplyAttr,
        ) {
            let Some(path) = self.path_of(ino) else {
                reply.error(ENOENT);
                return;
            };
            let errno = if let Some(size) = size {
                refused(self.vfs.truncate(&path, size))
            } else if let Some(mode) = mode {
                refused(self.vfs.chmod(&path, mode))
            } else if uid.is_some() || gid.is_some() {
                refused(self.vfs.chown(&path, uid, gid))
            } else {
                let to_time = |t: TimeOrNow| match t {
                    TimeOrNow::SpecificTime(t) => t,
                    TimeOrNow::Now => SystemTime::now(),
                };
                refused(
                    self.vfs
                        .utime(&path, atime.map(to_time), mtime.map(to_time)),
                )
            };
            reply.error(errno);
        }

        fn readlink(&mut self, _req: &Request, ino: u64, reply: ReplyData) {
            let Some(path) = self.path_of(ino) else {
                reply.error(ENOENT);
                return;
            };
            match self.vfs.readlink(&path) {
                Ok(target) => reply.data(target.as_os_str().as_bytes()),
                Err(e) => reply.error(e.errno()),
            }
        }

        fn mknod(
            &mut self,
            _req: &Request,
            parent: u64,
            name: &OsStr,
            mode: u32,
            _umask: u32,
            rdev: u32,
            reply: ReplyEntry,
        ) {
            match self.inodes.child(parent, name) {
                Some(path) => reply.error(refused(self.vfs.mknod(&path, mode, rdev))),
                None => reply.error(ENOENT),
            }
        }

        fn mkdir(
            &mut self,
            _req: &Request,
            parent: u64,
            name: &OsStr,
            mode: u32,
            _umask: u32,
            reply: ReplyEntry,
        ) {
            match self.inodes.child(parent, name) {
                Some(path) => reply.error(refused(self.vfs.mkdir(&path, mode))),
                None => reply.error(ENOENT),
            }
        }

        fn unlink(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
            match self.inodes.child(parent, name) {
                Some(path) => reply.error(refused(self.vfs.unlink(&path))),
                None => reply.error(ENOENT),
            }
        }

        fn rmdir(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
            match self.inodes.child(parent, name) {
                Some(path) => reply.error(refused(self.vfs.rmdir(&path))),
                None => reply.error(ENOENT),
            }
        }

        fn symlink(
            &mut self,
            _req: &Request,
            parent: u64,
            link_name: &OsStr,
            target: &Path,
            reply: ReplyEntry,
        ) {
            match self.inodes.child(parent, link_name) {
                Some(link) => reply.error(refused(self.vfs.symlink(target, &link))),
                None => reply.error(ENOENT),
            }
        }

        fn rename(
            &mut self,
            _req: &Request,
            parent: u64,
            name: &OsStr,
            newparent: u64,
            newname: &OsStr,
            _flags: u32,
            reply: ReplyEmpty,
        ) {
            match (
                self.inodes.child(parent, name),
                self.inodes.child(newparent, newname),
            ) {
                (Some(from), Some(to)) => reply.error(refused(self.vfs.rename(&from, &to))),
                _ => reply.error(ENOENT),
            }
        }

        fn link(
            &mut self,
            _req: &Request,
            ino: u64,
            newparent: u64,
            newname: &OsStr,
            reply: ReplyEntry,
        ) {
            match (self.path_of(ino), self.inodes.child(newparent, newname)) {
                (Some(target), Some(link)) => reply.error(refused(self.vfs.link(&target, &link))),
                _ => reply.error(ENOENT),
            }
        }

        fn open(&mut self, _req: &Request, ino: u64, flags: i32, reply: ReplyOpen) {
            let Some(path) = self.path_of(ino) else {
                reply.error(ENOENT);
                return;
            };
            // Handles are tracked by (path, flags), so no fh is needed.
            match self.vfs.open(&path, flags) {
                Ok(()) => reply.opened(0, 0),
                Err(e) => reply.error(e.errno()),
            }
        }

        fn read(
            &mut self,
            _req: &Request,
            ino: u64,
            _fh: u64,
            offset: i64,
            size: u32,
            _flags: i32,
            _lock_owner: Option<u64>,
            reply: ReplyData,
        ) {
            let Some(path) = self.path_of(ino) else {
                reply.error(ENOENT);
                return;
            };
            let Ok(offset) = u64::try_from(offset) else {
                reply.error(EINVAL);
                return;
            };
            match self.vfs.read(&path, size, offset) {
                Ok(data) => reply.data(&data),
                Err(e) => reply.error(e.errno()),
            }
        }

        fn write(
            &mut self,
            _req: &Request,
            ino: u64,
            _fh: u64,
            offset: i64,
            data: &[u8],
            _write_flags: u32,
            _flags: i32,
            _lock_owner: Option<u64>,
            reply: ReplyWrite,
        ) {
            match self.path_of(ino) {
                Some(path) => reply.error(refused(self.vfs.write(
                    &path,
                    data,
                    offset.max(0) as u64,
                ))),
                None => reply.error(ENOENT),
            }
        }

        fn release(
            &mut self,
            _req: &Request,
            ino: u64,
            _fh: u64,
            flags: i32,
            _lock_owner: Option<u64>,
            _flush: bool,
            reply: ReplyEmpty,
        ) {
            let Some(path) = self.path_of(ino) else {
                reply.error(ENOENT);
                return;
            };
            match self.vfs.release(&path, flags) {
                Ok(()) => reply.ok(),
                Err(e) => reply.error(e.errno()),
            }
        }

        fn fsync(&mut self, _req: &Request, ino: u64, _fh: u64, datasync: bool, reply: ReplyEmpty) {
            match self.path_of(ino) {
                Some(path) => reply.error(refused(self.vfs.fsync(&path, datasync))),
                None => reply.error(ENOENT),
            }
        }

        fn readdir(
            &mut self,
            _req: &Request,
            ino: u64,
            _fh: u64,
            offset: i64,
            mut reply: ReplyDirectory,
        ) {
            let Some(path) = self.path_of(ino) else {
                reply.error(ENOENT);
                return;
            };
            let entries = match self.vfs.readdir(&path) {
                Ok(entries) => entries,
                Err(e) => {
                    reply.error(e.errno());
                    return;
                }
            };

            // Offsets are 1-based positions in the listing.
            let skip = usize::try_from(offset).unwrap_or(0);
            for (i, entry) in entries.iter().enumerate().skip(skip) {
                let (child_ino, kind) = if entry.name == "." {
                    (ino, FileType::Directory)
                } else if entry.name == ".." {
                    (self.inodes.parent(ino), FileType::Directory)
                } else {
                    let child = path.join(&entry.name);
                    let kind = self
                        .vfs
                        .getattr(&child)
                        .map(|meta| file_type(&meta))
                        .unwrap_or(FileType::RegularFile);
                    (self.inodes.intern(child), kind)
                };
                if reply.add(child_ino, (i + 1) as i64, kind, &entry.name) {
                    break;
                }
            }
            reply.ok();
        }

        fn statfs(&mut self, _req: &Request, _ino: u64, reply: ReplyStatfs) {
            match self.vfs.statfs() {
                Ok(st) => reply.statfs(
                    st.blocks,
                    st.blocks_free,
                    st.blocks_available,
                    st.files,
                    st.files_free,
                    st.block_size,
                    st.name_max,
                    st.fragment_size,
                ),
                Err(e) => {
                    log_vfs_debug!("statfs failed", error = tracing::field::display(&e));
                    reply.error(e.errno())
                }
            }
        }
    }
}

#[cfg(not(all(feature = "fuse", target_os = "linux")))]
mod imp {
    use super::MountOptions;
    use crate::vfs::TimeMachineFs;

    /// Placeholder mount for non-Linux or non-feature builds
    pub struct TimeMachineMount;

    impl TimeMachineMount {
        pub fn new(_vfs: TimeMachineFs, _options: MountOptions) -> Self {
            #[cfg(not(target_os = "linux"))]
            tracing::warn!(
                "FUSE support is only available on Linux (current: {}).",
                std::env::consts::OS
            );
            #[cfg(all(target_os = "linux", not(feature = "fuse")))]
            tracing::warn!("FUSE mount is disabled. Compile with --features fuse to enable.");
            Self
        }

        pub fn mount(self, _mountpoint: &std::path::Path) -> anyhow::Result<()> {
            anyhow::bail!("FUSE not supported on this platform");
        }
    }
}

pub use imp::TimeMachineMount;
