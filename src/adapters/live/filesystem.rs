//! Disk-backed file access for the YAML store.

use std::path::Path;

use crate::ports::{FileSystem, PortError};

/// Reads and writes real files; writes create missing parent directories.
#[derive(Debug, Default, Clone, Copy)]
pub struct LiveFileSystem;

impl FileSystem for LiveFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, PortError> {
        std::fs::read_to_string(path).map_err(|e| format!("read {}: {e}", path.display()).into())
    }

    fn write(&self, path: &Path, contents: &str) -> Result<(), PortError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents).map_err(|e| format!("write {}: {e}", path.display()).into())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>, PortError> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(path)? {
            if let Some(name) = entry?.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_creates_parents_and_lists_sorted() {
        let root = std::env::temp_dir().join(format!("autonum-fs-{}", uuid::Uuid::new_v4()));
        let fs = LiveFileSystem;
        fs.write(&root.join("configs/b.yaml"), "b").unwrap();
        fs.write(&root.join("configs/a.yaml"), "a").unwrap();

        assert_eq!(fs.list_dir(&root.join("configs")).unwrap(), vec!["a.yaml", "b.yaml"]);
        assert_eq!(fs.read_to_string(&root.join("configs/a.yaml")).unwrap(), "a");
        assert!(fs.read_to_string(&root.join("missing.yaml")).is_err());

        let _ = std::fs::remove_dir_all(&root);
    }
}
