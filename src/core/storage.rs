//! Scoped storage for serialization artifacts.
//!
//! Content that cannot be embedded inline in a JSON document (image buffers)
//! is written as a file inside a caller-supplied directory, and the document
//! stores the file name. Every name handed out by one scope is unique, so
//! streams sharing a name and a time stamp never overwrite each other.

use crate::core::error::CoreResult;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Directory-like handle under which serialization artifacts are written.
///
/// Clones share the set of reserved file names.
#[derive(Debug, Clone)]
pub struct ScopedStorage {
    root: PathBuf,
    reserved: Rc<RefCell<HashSet<String>>>,
}

impl ScopedStorage {
    /// Open (and create if missing) a storage directory.
    pub fn new(root: impl Into<PathBuf>) -> CoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            reserved: Rc::default(),
        })
    }

    /// Root directory of this scope.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Open a nested scope (e.g. one per module).
    pub fn scope(&self, name: &str) -> CoreResult<ScopedStorage> {
        ScopedStorage::new(self.root.join(sanitize(name)))
    }

    /// Path of an artifact inside this scope.
    pub fn artifact_path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    /// Reserve a file name for an artifact of `stream` at `time_stamp`.
    ///
    /// The first reservation is `<stream>_<time_stamp>.<extension>`; later
    /// ones for the same pair get a numeric suffix.
    pub fn reserve(&self, stream: &str, time_stamp: u64, extension: &str) -> String {
        let base = format!("{}_{}", sanitize(stream), time_stamp);
        let mut reserved = self.reserved.borrow_mut();
        let mut file = format!("{}.{}", base, extension);
        let mut index = 1;
        while reserved.contains(&file) {
            file = format!("{}_{}.{}", base, index, extension);
            index += 1;
        }
        if index > 1 {
            log::debug!("Artifact name {}.{} already reserved, using {}", base, extension, file);
        }
        reserved.insert(file.clone());
        file
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
