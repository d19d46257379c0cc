//! # tmfs-fuse
//!
//! Read-only FUSE filesystem over the latest Time Machine snapshot of a host.
//!
//! - Every verb takes a conceptual path, resolves it through
//!   [`tmfs_resolver::PathResolver`] and runs the host operation on the real path.
//! - `open`/`release` pair up through a table keyed by (path, flags); `read`
//!   opens its own descriptor.
//! - Mutating verbs are always rejected with `ENOSYS`.
//! - Failures reach the kernel as `ENOENT`; the cause is only logged.

mod error;
mod fuse;
mod handles;
mod inode;
mod vfs;

pub use error::{VfsError, VfsResult};
pub use fuse::{MountOptions, TimeMachineMount};
pub use handles::OpenHandles;
pub use inode::{InodeTable, ROOT_INO};
pub use vfs::{DirEntry, FsStats, ReadOnlyVfs, TimeMachineFs, PLACEHOLDER_INO};
