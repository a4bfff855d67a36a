//! In-memory filesystem for exercising the YAML store without touching disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::ports::{FileSystem, PortError};

/// Filesystem backed by a map of paths to contents.
#[derive(Default)]
pub struct MemoryFileSystem {
    files: Mutex<BTreeMap<PathBuf, String>>,
}

impl MemoryFileSystem {
    /// Creates an empty filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a file.
    #[must_use]
    pub fn with_file(self, path: impl Into<PathBuf>, contents: &str) -> Self {
        self.files.lock().expect("fs lock poisoned").insert(path.into(), contents.to_string());
        self
    }
}

impl FileSystem for MemoryFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, PortError> {
        self.files
            .lock()
            .map_err(|e| e.to_string())?
            .get(path)
            .cloned()
            .ok_or_else(|| format!("file not found: {}", path.display()).into())
    }

    fn write(&self, path: &Path, contents: &str) -> Result<(), PortError> {
        self.files.lock().map_err(|e| e.to_string())?.insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files
            .lock()
            .map(|files| files.keys().any(|p| p == path || p.starts_with(path)))
            .unwrap_or(false)
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>, PortError> {
        let files = self.files.lock().map_err(|e| e.to_string())?;
        let mut entries: Vec<String> = files
            .keys()
            .filter_map(|p| p.strip_prefix(path).ok())
            .filter_map(|rest| rest.components().next())
            .filter_map(|c| c.as_os_str().to_str().map(str::to_string))
            .collect();
        entries.dedup();
        Ok(entries)
    }
}
