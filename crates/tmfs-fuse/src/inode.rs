//! Inode numbers handed to the kernel, each bound to one conceptual path.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Inode of the snapshot root (`FUSE_ROOT_ID`)
pub const ROOT_INO: u64 = 1;

#[derive(Debug)]
pub struct InodeTable {
    paths: HashMap<u64, PathBuf>,
    inodes: HashMap<PathBuf, u64>,
    next_inode: u64,
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeTable {
    pub fn new() -> Self {
        let mut table = Self {
            paths: HashMap::new(),
            inodes: HashMap::new(),
            next_inode: ROOT_INO + 1,
        };
        table.paths.insert(ROOT_INO, PathBuf::from("/"));
        table.inodes.insert(PathBuf::from("/"), ROOT_INO);
        table
    }

    /// Conceptual path bound to `ino`
    pub fn path(&self, ino: u64) -> Option<&Path> {
        self.paths.get(&ino).map(PathBuf::as_path)
    }

    /// Conceptual path of `name` inside directory `parent`
    pub fn child(&self, parent: u64, name: &OsStr) -> Option<PathBuf> {
        self.path(parent).map(|p| p.join(name))
    }

    /// Inode of the directory containing `ino` (the root is its own parent)
    pub fn parent(&mut self, ino: u64) -> u64 {
        match self.path(ino).and_then(Path::parent) {
            Some(parent) => {
                let parent = parent.to_path_buf();
                self.intern(parent)
            }
            None => ROOT_INO,
        }
    }

    /// Inode for `path`, allocating one on first sight
    pub fn intern(&mut self, path: PathBuf) -> u64 {
        if let Some(&ino) = self.inodes.get(&path) {
            return ino;
        }
        let ino = self.next_inode;
        self.next_inode += 1;
        self.paths.insert(ino, path.clone());
        self.inodes.insert(path, ino);
        ino
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_is_preallocated() {
        let table = InodeTable::new();
        assert_eq!(table.path(ROOT_INO), Some(Path::new("/")));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_intern_is_stable() {
        let mut table = InodeTable::new();
        let docs = table.child(ROOT_INO, OsStr::new("Documents")).unwrap();
        let a = table.intern(docs.clone());
        let b = table.intern(docs);
        assert_eq!(a, b);
        assert_ne!(a, ROOT_INO);
        assert_eq!(table.path(a), Some(Path::new("/Documents")));
    }

    #[test]
    fn test_parent_lookup() {
        let mut table = InodeTable::new();
        let docs = table.intern(PathBuf::from("/Documents"));
        let photos = table.intern(PathBuf::from("/Documents/Photos"));

        assert_eq!(table.parent(photos), docs);
        assert_eq!(table.parent(docs), ROOT_INO);
        assert_eq!(table.parent(ROOT_INO), ROOT_INO);
    }

    #[test]
    fn test_unknown_inode() {
        let table = InodeTable::new();
        assert!(table.path(42).is_none());
        assert!(table.child(42, OsStr::new("x")).is_none());
    }
}
