//! Signal persistence.
//!
//! Absence is the normal state of the polling protocol: `read` never fails,
//! it simply has nothing to return until the other party has written.

use sigdrop_common::{Error, Result};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

pub trait SignalStore: Send + Sync {
    /// Replace the signal at `path` with `text`.
    fn write(&self, path: &Path, text: &str) -> Result<()>;

    /// Current signal text at `path`, or `None` when missing, unreadable or empty.
    fn read(&self, path: &Path) -> Option<String>;
}

/// Signal files in a shared directory.
///
/// Writes go to a hidden sibling file which is then renamed over the
/// target, so a concurrent reader sees either the old or the new contents.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileStore;

impl FileStore {
    pub fn new() -> Self {
        Self
    }

    /// Create the signal directory if needed and check it is a directory.
    pub fn ensure_dir(dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        if !fs::metadata(dir)?.is_dir() {
            return Err(Error::config(format!(
                "signal path {} is not a directory",
                dir.display()
            )));
        }
        Ok(())
    }

    fn staging_path(path: &Path) -> Result<PathBuf> {
        let name = path.file_name().ok_or_else(|| {
            Error::config(format!("signal path {} has no file name", path.display()))
        })?;
        let mut staging = std::ffi::OsString::from(".");
        staging.push(name);
        staging.push(".tmp");
        Ok(path.with_file_name(staging))
    }
}

impl SignalStore for FileStore {
    fn write(&self, path: &Path, text: &str) -> Result<()> {
        let staging = Self::staging_path(path)?;
        fs::write(&staging, text)?;
        if let Err(err) = fs::rename(&staging, path) {
            let _ = fs::remove_file(&staging);
            return Err(err.into());
        }
        Ok(())
    }

    fn read(&self, path: &Path) -> Option<String> {
        match fs::read_to_string(path) {
            Ok(text) if text.trim().is_empty() => None,
            Ok(text) => Some(text),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => {
                debug!("signal file {} unreadable: {}", path.display(), err);
                None
            }
        }
    }
}

/// In-process signal store keyed by path.
///
/// Clones share the same contents, so two sessions in one process (or a
/// host that shuttles text between parties itself) can exchange signals.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    files: Arc<Mutex<HashMap<PathBuf, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SignalStore for MemoryStore {
    fn write(&self, path: &Path, text: &str) -> Result<()> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf(), text.to_string());
        Ok(())
    }

    fn read(&self, path: &Path) -> Option<String> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .filter(|text| !text.trim().is_empty())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(FileStore.read(&dir.path().join("offer.txt")), None);
    }

    #[test]
    fn write_creates_then_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("answer.txt");

        FileStore.write(&path, "type:answer\nsdp-begin\nv=0\nsdp-end\n").unwrap();
        FileStore.write(&path, "type:answer\nsdp-begin\nsdp-end\n").unwrap();

        assert_eq!(
            FileStore.read(&path).as_deref(),
            Some("type:answer\nsdp-begin\nsdp-end\n")
        );
        assert!(!dir.path().join(".answer.txt.tmp").exists());
    }

    #[test]
    fn empty_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offer.txt");
        fs::write(&path, "\n  \n").unwrap();
        assert_eq!(FileStore.read(&path), None);
    }

    #[test]
    fn write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("offer.txt");
        assert!(matches!(FileStore.write(&path, "type:offer\n"), Err(Error::Io(_))));
    }

    #[test]
    fn ensure_dir_creates_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("signals");
        FileStore::ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn ensure_dir_rejects_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("signals");
        fs::write(&file, "not a directory").unwrap();
        assert!(FileStore::ensure_dir(&file).is_err());
    }

    #[test]
    fn memory_store_clones_share_contents() {
        let store = MemoryStore::new();
        let peer_view = store.clone();
        let path = Path::new("signals/offer.txt");

        assert_eq!(peer_view.read(path), None);
        store.write(path, "type:offer\nsdp-begin\nsdp-end\n").unwrap();
        assert!(peer_view.read(path).is_some());
    }
}
