//! Atomic manifest output

use bootnet_core::{BootstrapError, Result};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Write `contents` to `path` through a temporary sibling and a rename.
///
/// Either the complete new file is visible at `path` or the previous state is
/// left untouched.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir).map_err(|e| {
        BootstrapError::storage(format!(
            "failed to create temporary file in {}: {e}",
            dir.display()
        ))
    })?;
    temp.write_all(contents.as_bytes())
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|e| {
            BootstrapError::storage(format!("failed to write {}: {e}", temp.path().display()))
        })?;
    temp.persist(path).map_err(|e| {
        BootstrapError::storage(format!("failed to replace {}: {}", path.display(), e.error))
    })?;
    tracing::debug!(path = %path.display(), bytes = contents.len(), "output written");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docker-compose.yml");
        std::fs::write(&path, "old").unwrap();
        write_atomic(&path, "new").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_missing_directory_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").join("docker-compose.yml");
        assert!(write_atomic(&path, "x").is_err());
        assert!(!path.exists());
    }
}
