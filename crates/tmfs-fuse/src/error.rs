use std::io;
use std::path::PathBuf;

use libc::c_int;
use thiserror::Error;
use tmfs_resolver::ResolveError;

/// Errors produced by filesystem verbs
#[derive(Error, Debug)]
pub enum VfsError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{verb}: operation not supported on a read-only snapshot")]
    NotSupported { verb: &'static str },

    /// `release` without a matching `open`.
    #[error("no open handle for {} (flags {flags:#o})", path.display())]
    UnknownHandle { path: PathBuf, flags: i32 },
}

pub type VfsResult<T> = std::result::Result<T, VfsError>;

impl VfsError {
    pub(crate) fn not_supported(verb: &'static str) -> Self {
        VfsError::NotSupported { verb }
    }

    /// The errno handed back to the kernel.
    ///
    /// Resolution and host failures all surface as `ENOENT`; the richer cause
    /// only reaches the logs.
    pub fn errno(&self) -> c_int {
        match self {
            VfsError::NotSupported { .. } => libc::ENOSYS,
            VfsError::UnknownHandle { .. } => libc::EBADF,
            VfsError::Resolve(_) | VfsError::Io(_) => libc::ENOENT,
        }
    }

    /// True when the backup format's placeholder invariant did not hold.
    pub fn is_corrupt_backup(&self) -> bool {
        matches!(self, VfsError::Resolve(ResolveError::CorruptBackup { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_errno_collapses_read_failures() {
        let not_found = VfsError::from(ResolveError::NotFound {
            path: PathBuf::from("/x"),
        });
        let denied = VfsError::from(ResolveError::PermissionDenied {
            path: PathBuf::from("/x"),
        });
        let corrupt = VfsError::from(ResolveError::CorruptBackup {
            placeholder: PathBuf::from("/x"),
            indirect: PathBuf::from("/p/dir_120"),
            link_count: 120,
        });
        let io = VfsError::from(io::Error::from(io::ErrorKind::InvalidData));

        for err in [&not_found, &denied, &corrupt, &io] {
            assert_eq!(err.errno(), libc::ENOENT);
        }
        assert!(corrupt.is_corrupt_backup());
        assert!(!not_found.is_corrupt_backup());
    }

    #[test]
    fn test_errno_for_rejections() {
        assert_eq!(VfsError::not_supported("write").errno(), libc::ENOSYS);
        let unknown = VfsError::UnknownHandle {
            path: Path::new("/a").to_path_buf(),
            flags: 0,
        };
        assert_eq!(unknown.errno(), libc::EBADF);
    }
}
