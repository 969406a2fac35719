//! Whole-file text storage for patched sources.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::result::{RemendarError, RemendarResult};

/// Reads and writes entire source files
pub trait SourceStore {
    /// Full text of `path`
    fn read(&self, path: &Path) -> RemendarResult<String>;

    /// Replace the full text of `path`
    fn write(&self, path: &Path, text: &str) -> RemendarResult<()>;
}

/// Files on disk, optionally resolved against a root directory
#[derive(Debug, Clone, Default)]
pub struct FsSourceStore {
    root: Option<PathBuf>,
}

impl FsSourceStore {
    /// Paths used as given
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Relative paths resolved against `root`
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl SourceStore for FsSourceStore {
    fn read(&self, path: &Path) -> RemendarResult<String> {
        Ok(std::fs::read_to_string(self.resolve(path))?)
    }

    fn write(&self, path: &Path, text: &str) -> RemendarResult<()> {
        Ok(std::fs::write(self.resolve(path), text)?)
    }
}

#[derive(Debug, Default)]
struct MemoryFiles {
    files: BTreeMap<PathBuf, String>,
    writes: usize,
}

/// In-memory files; clones share contents
#[derive(Debug, Clone, Default)]
pub struct MemorySourceStore {
    inner: Rc<RefCell<MemoryFiles>>,
}

impl MemorySourceStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file without counting it as a write
    #[must_use]
    pub fn with_file(self, path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        self.inner.borrow_mut().files.insert(path.into(), text.into());
        self
    }

    /// Current text of `path`
    #[must_use]
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
        self.inner.borrow().files.get(path.as_ref()).cloned()
    }

    /// Number of writes performed through [`SourceStore::write`]
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.inner.borrow().writes
    }
}

impl SourceStore for MemorySourceStore {
    fn read(&self, path: &Path) -> RemendarResult<String> {
        self.contents(path).ok_or_else(|| {
            RemendarError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            ))
        })
    }

    fn write(&self, path: &Path, text: &str) -> RemendarResult<()> {
        let mut inner = self.inner.borrow_mut();
        inner.files.insert(path.to_path_buf(), text.to_string());
        inner.writes += 1;
        Ok(())
    }
}
