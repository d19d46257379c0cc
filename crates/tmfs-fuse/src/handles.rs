//! Descriptors produced by `open`, kept until the matching `release`.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Open files keyed by (conceptual path, open flags).
///
/// The kernel pairs every `open` with one `release` carrying the same flags,
/// so one slot per key is enough.
#[derive(Debug, Default)]
pub struct OpenHandles {
    files: HashMap<(PathBuf, i32), File>,
}

impl OpenHandles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `file`, returning any descriptor previously held for the key.
    pub fn insert(&mut self, path: &Path, flags: i32, file: File) -> Option<File> {
        self.files.insert((path.to_path_buf(), flags), file)
    }

    pub fn remove(&mut self, path: &Path, flags: i32) -> Option<File> {
        self.files.remove(&(path.to_path_buf(), flags))
    }

    pub fn contains(&self, path: &Path, flags: i32) -> bool {
        self.files.contains_key(&(path.to_path_buf(), flags))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
